// src/system/browser.rs

use std::io;

/// Opens URLs in a web browser.
pub trait BrowserOpener {
    /// Opens `url`, in the named browser application when `app` is given.
    fn open(&self, url: &str, app: Option<&str>) -> io::Result<()>;
}

/// The user's desktop browser, through the `open` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str, app: Option<&str>) -> io::Result<()> {
        match app {
            Some(app) => open::with(url, app),
            None => open::that(url),
        }
    }
}
