//! Post-CAPTCHA login and frameset traversal.
//!
//! The portal is a legacy frameset UI: the login form, navigation tree, and
//! result tables each live in differently-named frames depending on the
//! page. Nothing about frame layout is documented or stable, so every lookup
//! scans a list of known frame names and takes the first hit.

use crate::portal::errors::PortalError;
use crate::portal::extract::{self, AttendanceRecord};
use std::time::Duration;
use thirtyfour::prelude::*;
use tracing::{debug, info, warn};

/// Frames that may contain the activities menu after login.
const MENU_FRAMES: &[&str] = &["top", "contents", "data", "banner"];
/// Frames that may contain the navigation tree.
const TREE_FRAMES: &[&str] = &["data", "top", "contents", "bottom", "banner"];
/// Frames that may contain the year/semester form and the result table.
const DATA_FRAMES: &[&str] = &["data", "contents", "bottom", "top"];

/// Dropdown name/id fragments that identify the year selector.
const YEAR_KEYS: &[&str] = &["year", "yr", "academic", "session"];
/// Dropdown name/id fragments that identify the semester selector.
const SEMESTER_KEYS: &[&str] = &["sem", "semester", "term", "part"];

/// Button value fragments that mark PDF/export buttons, which must never be
/// clicked: they navigate the frame away from the HTML table.
const SKIP_BUTTON_VALUES: &[&str] = &["pdf", "download", "export", "print"];
const SKIP_BUTTON_NAMES: &[&str] = &["pdf", "mpdfx", "download"];

/// Complete the login with the solved CAPTCHA, walk the menu to the
/// attendance page, select the requested year/semester, and extract the
/// table. The driver is left parked on the result page; the caller owns
/// cleanup regardless of outcome.
pub async fn scrape_attendance(
    driver: &WebDriver,
    password: &str,
    captcha: &str,
    year_idx: usize,
    semester_idx: usize,
) -> Result<Vec<AttendanceRecord>, PortalError> {
    submit_login(driver, password, captcha).await?;
    verify_login(driver).await?;

    tokio::time::sleep(Duration::from_secs(3)).await;
    if !click_activities_link(driver).await? {
        return Err(PortalError::ActivitiesNotFound);
    }
    driver.enter_default_frame().await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Best-effort: on some accounts the tree is already expanded
    if !expand_tree_node(driver, &["Attendance"]).await {
        debug!("No expandable attendance tree node found, continuing");
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    if !click_link(driver, &["My Attendance"], true).await {
        return Err(PortalError::AttendanceLinkNotFound);
    }
    debug!("Clicked My Attendance");
    tokio::time::sleep(Duration::from_secs(5)).await;

    let outcome = select_year_semester(driver, year_idx, semester_idx).await;
    if !outcome.year || !outcome.semester {
        warn!(
            year = outcome.year,
            semester = outcome.semester,
            "Dropdown selection incomplete"
        );
        return Err(PortalError::SelectionFailed);
    }
    if !outcome.submitted {
        warn!("Submit button was not clicked");
    }

    info!("Extracting attendance data");
    let mut records = Vec::new();
    for html in collect_frame_html(driver).await {
        let rows = extract::extract_attendance(&html);
        if !rows.is_empty() {
            debug!(subjects = rows.len(), "Extracted subjects from frame");
            records.extend(rows);
        }
    }
    driver.enter_default_frame().await?;

    if records.is_empty() {
        return Err(PortalError::NoData);
    }

    info!(subjects = records.len(), "Scrape complete");
    Ok(records)
}

/// Fill password and CAPTCHA on the parked login form and submit.
async fn submit_login(
    driver: &WebDriver,
    password: &str,
    captcha: &str,
) -> Result<(), PortalError> {
    driver.enter_default_frame().await?;
    driver.enter_frame(0).await?;

    debug!("Filling password");
    let pwd_input = driver.query(By::Id("pwd")).first().await?;
    pwd_input.clear().await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    pwd_input.send_keys(password).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    debug!("Filling CAPTCHA");
    let captcha_input = driver.find(By::Id("cap")).await?;
    captcha_input.clear().await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    captcha_input.send_keys(captcha).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let submit_btn = driver.find(By::Name("login")).await?;
    submit_btn.click().await?;
    debug!("Login form submitted");
    tokio::time::sleep(Duration::from_secs(6)).await;
    Ok(())
}

/// Login succeeded iff the portal redirected to the student landing page.
async fn verify_login(driver: &WebDriver) -> Result<(), PortalError> {
    driver.enter_default_frame().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let url = driver.current_url().await?;
    debug!(url = %url, "Verifying login");
    if !url.as_str().contains("student.htm") {
        return Err(PortalError::LoginRejected);
    }
    info!("Login successful");
    Ok(())
}

/// Switch into a named frame of the current document.
async fn enter_frame_named(driver: &WebDriver, name: &str) -> WebDriverResult<()> {
    let selector = format!("frame[name='{name}'], iframe[name='{name}']");
    let frame = driver.find(By::Css(selector.as_str())).await?;
    frame.enter_frame().await
}

/// Find and click the "My Activities" menu entry across the menu frames.
async fn click_activities_link(driver: &WebDriver) -> Result<bool, PortalError> {
    for frame in MENU_FRAMES {
        driver.enter_default_frame().await?;
        if enter_frame_named(driver, frame).await.is_err() {
            continue;
        }
        let Ok(links) = driver.find_all(By::Tag("a")).await else {
            continue;
        };
        for link in links {
            let text = link.text().await.unwrap_or_default();
            if text.to_lowercase().contains("activit") {
                debug!(frame, link = %text.trim(), "Found activities link");
                if link.click().await.is_ok() {
                    return Ok(true);
                }
                // A stale or obscured link in this frame; try the next one
                break;
            }
        }
    }
    Ok(false)
}

/// Expand a collapsed tree node whose label matches one of `keywords`.
///
/// The portal renders its navigation tree with jQuery treeview, which marks
/// the clickable expander `<div>`s with a `hitarea` class. Best-effort:
/// returns false when nothing matched, which is not fatal.
async fn expand_tree_node(driver: &WebDriver, keywords: &[&str]) -> bool {
    for frame in TREE_FRAMES {
        if driver.enter_default_frame().await.is_err() {
            continue;
        }
        if enter_frame_named(driver, frame).await.is_err() {
            continue;
        }

        // Strategy 1: locate label text, then an expander among its siblings
        let label_xpath = "//*[contains(text(), 'Attendance') or contains(text(), 'ATTENDANCE')]";
        if let Ok(labels) = driver.find_all(By::XPath(label_xpath)).await {
            for label in labels {
                let Ok(parent) = label.find(By::XPath("./..")).await else {
                    continue;
                };
                let Ok(hitareas) = parent.find_all(By::ClassName("hitarea")).await else {
                    continue;
                };
                for hitarea in hitareas {
                    let classes = hitarea.class_name().await.ok().flatten().unwrap_or_default();
                    if (classes.contains("expandable-hitarea")
                        || classes.contains("collapsable-hitarea"))
                        && hitarea.click().await.is_ok()
                    {
                        debug!(frame, "Expanded tree node next to label");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        let _ = driver.enter_default_frame().await;
                        return true;
                    }
                }
            }
        }

        // Strategy 2: scan all expanders and match on the parent's text
        let Ok(hitareas) = driver.find_all(By::ClassName("hitarea")).await else {
            continue;
        };
        for hitarea in hitareas {
            let classes = hitarea.class_name().await.ok().flatten().unwrap_or_default();
            if !classes.contains("expandable-hitarea") {
                continue;
            }
            let Ok(parent) = hitarea.find(By::XPath("./..")).await else {
                continue;
            };
            let text = parent.text().await.unwrap_or_default().to_lowercase();
            if keywords.iter().any(|k| text.contains(&k.to_lowercase()))
                && hitarea.click().await.is_ok()
            {
                debug!(frame, label = %text.trim(), "Expanded tree node");
                tokio::time::sleep(Duration::from_secs(2)).await;
                let _ = driver.enter_default_frame().await;
                return true;
            }
        }
    }

    let _ = driver.enter_default_frame().await;
    false
}

/// Find and click a link by keywords, checking the top-level document first
/// and then each known frame.
///
/// With `exact`, the link text must equal a keyword (or the keyword must
/// appear verbatim in the link's inner HTML); otherwise a case-insensitive
/// substring match on the text suffices.
async fn click_link(driver: &WebDriver, keywords: &[&str], exact: bool) -> bool {
    if driver.enter_default_frame().await.is_ok()
        && try_click_link_here(driver, keywords, exact).await
    {
        return true;
    }

    for frame in TREE_FRAMES {
        if driver.enter_default_frame().await.is_err() {
            continue;
        }
        if enter_frame_named(driver, frame).await.is_err() {
            continue;
        }
        if try_click_link_here(driver, keywords, exact).await {
            debug!(frame, "Clicked link");
            return true;
        }
    }
    false
}

/// Scan anchors in the current frame context for a keyword match and click it.
async fn try_click_link_here(driver: &WebDriver, keywords: &[&str], exact: bool) -> bool {
    let Ok(links) = driver.find_all(By::Tag("a")).await else {
        return false;
    };
    for link in links {
        let text = link.text().await.unwrap_or_default();
        let text = text.trim();
        let matched = if exact {
            keywords.contains(&text) || {
                let html = link.inner_html().await.unwrap_or_default();
                keywords.iter().any(|k| html.contains(k))
            }
        } else {
            let lower = text.to_lowercase();
            keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
        };
        if matched && link.click().await.is_ok() {
            return true;
        }
    }
    false
}

struct SelectionOutcome {
    year: bool,
    semester: bool,
    submitted: bool,
}

/// Select year and semester dropdowns by index, then submit the form.
///
/// Dropdowns are identified by name/id fragments, falling back to position
/// (first dropdown = year, next = semester). When a dropdown leads with a
/// blank placeholder option the requested index shifts by one.
async fn select_year_semester(
    driver: &WebDriver,
    year_idx: usize,
    semester_idx: usize,
) -> SelectionOutcome {
    let mut outcome = SelectionOutcome {
        year: false,
        semester: false,
        submitted: false,
    };

    for frame in DATA_FRAMES {
        if driver.enter_default_frame().await.is_err() {
            continue;
        }
        if enter_frame_named(driver, frame).await.is_err() {
            continue;
        }

        let Ok(selects) = driver.find_all(By::Tag("select")).await else {
            continue;
        };
        debug!(frame, dropdowns = selects.len(), "Scanning dropdowns");

        for (idx, select_elem) in selects.iter().enumerate() {
            let Ok(options) = select_elem.find_all(By::Tag("option")).await else {
                continue;
            };
            let name = dropdown_name(select_elem).await;

            if !outcome.year {
                let by_name = YEAR_KEYS.iter().any(|k| name.contains(k));
                let by_position = idx == 0 && !outcome.semester;
                if by_name || by_position {
                    let target = adjusted_index(&options, year_idx).await;
                    if select_option(&options, target).await {
                        debug!(frame, name = %name, index = target, "Year selected");
                        outcome.year = true;
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    } else if by_name {
                        warn!(frame, name = %name, index = target, "Year index out of range");
                    }
                }
            } else if !outcome.semester {
                let by_name = SEMESTER_KEYS.iter().any(|k| name.contains(k));
                // Year is already chosen, so any later dropdown is assumed
                // to be the semester when the name gives no hint
                if by_name || outcome.year {
                    let target = adjusted_index(&options, semester_idx).await;
                    if select_option(&options, target).await {
                        debug!(frame, name = %name, index = target, "Semester selected");
                        outcome.semester = true;
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        if outcome.year && outcome.semester {
            outcome.submitted = click_submit_button(driver).await;
            if outcome.submitted {
                break;
            }
            warn!(frame, "No valid submit button found");
        }
    }

    outcome
}

/// Lowercased name (or id) attribute of a dropdown.
async fn dropdown_name(elem: &WebElement) -> String {
    let name = match elem.attr("name").await.ok().flatten() {
        Some(n) if !n.is_empty() => n,
        _ => elem.attr("id").await.ok().flatten().unwrap_or_default(),
    };
    name.to_lowercase()
}

/// Choose `options[index]` by clicking it, which is how a user (and
/// Selenium's Select helper) picks from a single-select dropdown.
async fn select_option(options: &[WebElement], index: usize) -> bool {
    match options.get(index) {
        Some(option) => option.click().await.is_ok(),
        None => false,
    }
}

/// Shift the requested index past a leading blank/placeholder option.
///
/// Reads the value *property*, not the attribute: a valueless
/// `<option>2023-24</option>` reports its text as the property (what the
/// form would submit), so it is a real choice rather than a placeholder.
async fn adjusted_index(options: &[WebElement], requested: usize) -> usize {
    if let Some(first) = options.first() {
        let value = first.prop("value").await.ok().flatten();
        let text = first.text().await.unwrap_or_default();
        if is_placeholder_option(value.as_deref(), &text) {
            debug!(index = requested + 1, "First option is blank, shifting index");
            return requested + 1;
        }
    }
    requested
}

/// A leading option counts as a placeholder when its submitted value is
/// empty or its text is a "Select ..." prompt.
fn is_placeholder_option(value: Option<&str>, text: &str) -> bool {
    value.unwrap_or_default().is_empty() || text.to_lowercase().contains("select")
}

/// Click the form's submit button in the current frame, skipping the PDF and
/// export buttons that sit alongside it.
async fn click_submit_button(driver: &WebDriver) -> bool {
    let mut buttons = driver.find_all(By::Tag("input")).await.unwrap_or_default();
    buttons.extend(driver.find_all(By::Tag("button")).await.unwrap_or_default());

    for button in buttons {
        let button_type = lower_attr(&button, "type").await;
        let value = lower_attr(&button, "value").await;
        let name = lower_attr(&button, "name").await;

        if SKIP_BUTTON_VALUES.iter().any(|s| value.contains(s)) {
            debug!(value = %value, "Skipping export button");
            continue;
        }
        if SKIP_BUTTON_NAMES.iter().any(|s| name.contains(s)) {
            debug!(name = %name, "Skipping export button");
            continue;
        }

        if button_type == "submit" && name.contains("submit") {
            debug!(name = %name, "Clicking submit button");
            if button.click().await.is_ok() {
                tokio::time::sleep(Duration::from_secs(5)).await;
                return true;
            }
        }
    }
    false
}

async fn lower_attr(elem: &WebElement, attr: &str) -> String {
    elem.attr(attr)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
        .to_lowercase()
}

/// Page sources of every data frame that plausibly holds the attendance
/// table: anything mentioning "attend" with a non-trivial body.
async fn collect_frame_html(driver: &WebDriver) -> Vec<String> {
    let mut pages = Vec::new();
    for frame in DATA_FRAMES {
        if driver.enter_default_frame().await.is_err() {
            continue;
        }
        if enter_frame_named(driver, frame).await.is_err() {
            continue;
        }
        if let Ok(html) = driver.source().await
            && html.len() > 500
            && html.to_lowercase().contains("attend")
        {
            debug!(frame, bytes = html.len(), "Found candidate frame");
            pages.push(html);
        }
    }
    let _ = driver.enter_default_frame().await;
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_property_is_placeholder() {
        assert!(is_placeholder_option(Some(""), ""));
        assert!(is_placeholder_option(None, ""));
    }

    #[test]
    fn test_select_prompt_text_is_placeholder() {
        assert!(is_placeholder_option(Some("0"), "Select Year"));
        assert!(is_placeholder_option(Some("-1"), "-- select semester --"));
    }

    #[test]
    fn test_valueless_option_reports_text_as_value_property() {
        // Browsers report an <option> without a value attribute as having
        // its text for the value property, so a real first choice like
        // <option>2023-24</option> must not trigger the shift.
        assert!(!is_placeholder_option(Some("2023-24"), "2023-24"));
    }

    #[test]
    fn test_explicit_value_is_not_placeholder() {
        assert!(!is_placeholder_option(Some("1"), "First Year"));
    }
}
