//! Usage: Presentation surfaces for the browser-based consent pages.
//!
//! - `SystemBrowserHost`: hands the authorize URL to the platform opener
//! - `ConsoleSurface`: prints the URL so the user can open it manually

use crate::domain::sign_in::{PresentationHost, PresentationSurface};
use crate::shared::error::AppResult;
use std::process::Command;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SystemBrowser;

impl PresentationSurface for SystemBrowser {
    fn present(&self, url: &str) -> AppResult<()> {
        tracing::debug!("opening authorize url in system browser");
        open_browser(url)
    }
}

/// Prints the authorize URL on stderr.
#[derive(Debug, Default)]
pub struct ConsoleSurface;

impl PresentationSurface for ConsoleSurface {
    fn present(&self, url: &str) -> AppResult<()> {
        eprintln!("ブラウザで次のURLを開いてログインしてください:\n{url}");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SystemBrowserHost;

impl PresentationHost for SystemBrowserHost {
    fn presentation_surface(&self) -> Option<Arc<dyn PresentationSurface>> {
        if !has_graphical_session(|key| std::env::var_os(key).is_some()) {
            tracing::debug!("no graphical session detected; system browser unavailable");
            return None;
        }
        Some(Arc::new(SystemBrowser))
    }
}

/// Always answers with the same surface (or none).
#[derive(Clone, Default)]
pub struct StaticPresentationHost {
    surface: Option<Arc<dyn PresentationSurface>>,
}

impl StaticPresentationHost {
    pub fn new(surface: Option<Arc<dyn PresentationSurface>>) -> Self {
        Self { surface }
    }

    pub fn console() -> Self {
        Self::new(Some(Arc::new(ConsoleSurface)))
    }
}

impl PresentationHost for StaticPresentationHost {
    fn presentation_surface(&self) -> Option<Arc<dyn PresentationSurface>> {
        self.surface.clone()
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn has_graphical_session(is_set: impl Fn(&str) -> bool) -> bool {
    is_set("DISPLAY") || is_set("WAYLAND_DISPLAY")
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn has_graphical_session(_is_set: impl Fn(&str) -> bool) -> bool {
    true
}

fn open_browser(url: &str) -> AppResult<()> {
    #[cfg(target_os = "windows")]
    {
        build_windows_open_browser_command(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[allow(unreachable_code)]
    Err("SYSTEM_ERROR: browser open is unsupported on this platform"
        .to_string()
        .into())
}

#[cfg(target_os = "windows")]
fn build_windows_open_browser_command(url: &str) -> Command {
    let mut cmd = Command::new("rundll32.exe");
    // `explorer <url>` may open File Explorer for some URL shapes.
    cmd.arg("url.dll,FileProtocolHandler").arg(url);
    cmd
}
