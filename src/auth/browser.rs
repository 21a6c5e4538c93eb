//! Usage: Launching the platform browser for the login page.

use crate::shared::error::AppResult;

/// Seam for opening an external URL. Tests substitute a recorder so the
/// login flow can be exercised without a real browser.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> AppResult<()>;
}

/// Launches the user's default browser through the platform opener.
#[derive(Default)]
pub struct SystemBrowserOpener;

impl SystemBrowserOpener {
    pub fn new() -> Self {
        Self
    }
}

impl BrowserOpener for SystemBrowserOpener {
    fn open(&self, url: &str) -> AppResult<()> {
        open_browser(url)
    }
}

#[cfg(target_os = "windows")]
fn build_windows_open_browser_command(url: &str) -> std::process::Command {
    let mut command = std::process::Command::new("rundll32");
    command.arg("url.dll,FileProtocolHandler").arg(url);
    command
}

#[cfg(target_os = "windows")]
fn open_browser(url: &str) -> AppResult<()> {
    build_windows_open_browser_command(url)
        .spawn()
        .map_err(|e| format!("failed to open browser: {e}"))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn open_browser(url: &str) -> AppResult<()> {
    std::process::Command::new("open")
        .arg(url)
        .spawn()
        .map_err(|e| format!("failed to open browser: {e}"))?;
    Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn open_browser(url: &str) -> AppResult<()> {
    std::process::Command::new("xdg-open")
        .arg(url)
        .spawn()
        .map_err(|e| format!("failed to open browser: {e}"))?;
    Ok(())
}
