//! 地址栏 - 基础设施层
//!
//! 以"历史记录 + 游标"的方式模拟浏览器地址栏：
//! - `push` / `replace` 对应 pushState / replaceState，不触发监听器
//! - `back` / `forward` 只有在 fragment 变化时才通知监听器（hashchange）

use std::fmt;
use url::Url;

type Listener = Box<dyn FnMut(&Url) + Send>;

/// 地址栏
pub struct AddressBar {
    history: Vec<Url>,
    cursor: usize,
    listeners: Vec<Listener>,
}

impl AddressBar {
    pub fn new(initial: Url) -> Self {
        Self {
            history: vec![initial],
            cursor: 0,
            listeners: Vec::new(),
        }
    }

    /// 当前地址
    pub fn current(&self) -> &Url {
        &self.history[self.cursor]
    }

    /// 写入新地址并丢弃前进历史（不刷新页面）
    pub fn push(&mut self, url: Url) {
        self.history.truncate(self.cursor + 1);
        self.history.push(url);
        self.cursor = self.history.len() - 1;
    }

    /// 替换当前地址
    pub fn replace(&mut self, url: Url) {
        self.history[self.cursor] = url;
    }

    /// 后退一步；已在最早的记录时返回 false
    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.navigate_to(self.cursor - 1);
        true
    }

    /// 前进一步；没有前进历史时返回 false
    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.history.len() {
            return false;
        }
        self.navigate_to(self.cursor + 1);
        true
    }

    /// 注册 hashchange 监听器
    pub fn subscribe(&mut self, listener: impl FnMut(&Url) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn navigate_to(&mut self, index: usize) {
        let previous_fragment = self.current().fragment().map(str::to_string);
        self.cursor = index;

        let url = self.history[self.cursor].clone();
        if url.fragment().map(str::to_string) != previous_fragment {
            for listener in self.listeners.iter_mut() {
                listener(&url);
            }
        }
    }
}

impl fmt::Debug for AddressBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressBar")
            .field("current", &self.current().as_str())
            .field("cursor", &self.cursor)
            .field("history_len", &self.history.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
