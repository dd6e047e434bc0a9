//! URL 状态管理
//!
//! 批次 ID 是唯一持久化到地址栏的状态，格式为 `#batchId=<value>`

use url::form_urlencoded;
use url::Url;

use crate::error::AppResult;
use crate::infrastructure::address_bar::AddressBar;

const BATCH_ID_KEY: &str = "batchId";

/// URL 状态管理器
///
/// 除地址栏外没有任何网络或存储副作用
#[derive(Debug)]
pub struct UrlStateManager {
    address_bar: AddressBar,
}

impl UrlStateManager {
    pub fn new(address_bar: AddressBar) -> Self {
        Self { address_bar }
    }

    /// 从分享链接（或任意页面地址）创建
    ///
    /// # 参数
    /// - `location`: 完整地址，例如 `https://upload.arke.institute/#batchId=01K9...`
    pub fn from_location(location: &str) -> AppResult<Self> {
        let url = Url::parse(location)?;
        Ok(Self::new(AddressBar::new(url)))
    }

    /// 写入批次 ID（可通过后退/前进导航）
    pub fn set_batch_id(&mut self, batch_id: &str) {
        let fragment: String = form_urlencoded::Serializer::new(String::new())
            .append_pair(BATCH_ID_KEY, batch_id)
            .finish();

        let mut url = self.address_bar.current().clone();
        url.set_fragment(Some(&fragment));
        self.address_bar.push(url);
    }

    /// 读取批次 ID；不存在或为空时返回 None
    pub fn get_batch_id(&self) -> Option<String> {
        batch_id_from_url(self.address_bar.current())
    }

    /// 清除批次 ID，回到干净的页面地址
    pub fn clear_batch_id(&mut self) {
        let mut url = self.address_bar.current().clone();
        url.set_fragment(None);
        url.set_query(None);
        self.address_bar.push(url);
    }

    /// 用户后退/前进导航导致 fragment 变化时回调当前批次 ID
    pub fn on_hash_change(&mut self, mut callback: impl FnMut(Option<String>) + Send + 'static) {
        self.address_bar
            .subscribe(move |url| callback(batch_id_from_url(url)));
    }

    pub fn back(&mut self) -> bool {
        self.address_bar.back()
    }

    pub fn forward(&mut self) -> bool {
        self.address_bar.forward()
    }

    /// 当前完整地址（即分享链接）
    pub fn current_url(&self) -> &Url {
        self.address_bar.current()
    }
}

fn batch_id_from_url(url: &Url) -> Option<String> {
    let fragment = url.fragment()?;
    form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == BATCH_ID_KEY)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
