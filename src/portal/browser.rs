//! Browser launch and the CAPTCHA half of the login flow.
//!
//! Login happens in two phases because the CAPTCHA needs a human: first we
//! drive the browser up to the point where the CAPTCHA image is visible and
//! screenshot it, then the session parks until the client calls back with
//! the transcription (see [`crate::portal::navigate`]).

use crate::config::Config;
use crate::portal::errors::PortalError;
use crate::session::mask_roll_no;
use std::time::Duration;
use thirtyfour::prelude::*;
use tracing::{debug, info, warn};

/// A browser parked on the login form, plus the CAPTCHA screenshot.
pub struct CaptchaChallenge {
    pub driver: WebDriver,
    pub image_png: Vec<u8>,
}

/// Start a Chrome session against the configured chromedriver.
async fn launch(config: &Config) -> Result<WebDriver, PortalError> {
    let mut caps = DesiredCapabilities::chrome();
    caps.add_arg("--no-sandbox")?;
    caps.add_arg("--disable-dev-shm-usage")?;
    caps.add_arg("--window-size=1920,1080")?;
    caps.add_arg("--start-maximized")?;
    if config.headless {
        caps.set_headless()?;
    }

    let driver = WebDriver::new(&config.webdriver_url, caps).await?;
    Ok(driver)
}

/// Open the portal, reach the login form, fill the roll number, and
/// screenshot the CAPTCHA. The returned driver stays parked on the form.
pub async fn begin_login(config: &Config, roll_no: &str) -> Result<CaptchaChallenge, PortalError> {
    info!(roll_no = %mask_roll_no(roll_no), "Fetching CAPTCHA");

    let driver = launch(config).await?;

    match prepare_captcha(&driver, &config.portal_url, roll_no).await {
        Ok(image_png) => Ok(CaptchaChallenge { driver, image_png }),
        Err(e) => {
            if let Err(quit_err) = driver.quit().await {
                warn!(error = %quit_err, "Failed to quit browser after CAPTCHA failure");
            }
            Err(e)
        }
    }
}

async fn prepare_captcha(
    driver: &WebDriver,
    portal_url: &str,
    roll_no: &str,
) -> Result<Vec<u8>, PortalError> {
    debug!(url = portal_url, "Loading portal");
    driver.goto(portal_url).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    debug!("Clicking student login link");
    let login_link = driver
        .query(By::PartialLinkText("Student Login"))
        .first()
        .await?;
    login_link.click().await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    // The login form lives inside the first frame of a legacy frameset
    driver.enter_frame(0).await?;

    debug!("Filling roll number");
    let uid_input = driver.query(By::Id("uid")).first().await?;
    uid_input.clear().await?;
    uid_input.send_keys(roll_no).await?;

    let captcha_img = driver.query(By::Id("captchaimg")).first().await?;
    // Give the image a moment to finish rendering before the screenshot
    tokio::time::sleep(Duration::from_secs(2)).await;
    let image_png = captcha_img.screenshot_as_png().await?;

    debug!(bytes = image_png.len(), "Captured CAPTCHA image");
    Ok(image_png)
}
