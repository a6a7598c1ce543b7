//! The fixed step sequence of the form.

use tokio::time::{timeout_at, Instant};

use crate::link::DownloadLink;

use super::error::{NavigationError, Step};
use super::select::{pick_edition, pick_language, EditionPolicy};
use super::session::BrowserSession;
use super::NavigationTarget;

/// Walk the form in `session` and return the download link it ends on.
///
/// Each step waits up to `target.timeout` for its control to become
/// interactable, pauses per `target.pacing`, then acts. The first failing step
/// ends the attempt; later steps are not run.
pub async fn resolve_link<S>(
    session: &mut S,
    target: &NavigationTarget,
) -> Result<DownloadLink, NavigationError>
where
    S: BrowserSession + ?Sized,
{
    let layout = &target.layout;
    tracing::info!(url = %target.url, "opening download form");
    session.goto(&target.url).await?;

    wait_until_interactable(session, target, &layout.edition_select, Step::Edition).await?;
    target.pacing.pause().await;
    let editions = session.option_values(&layout.edition_select).await?;
    let edition = pick_edition(&editions, &target.edition).ok_or_else(|| {
        NavigationError::SelectionNotFound {
            control: Step::Edition,
            wanted: match &target.edition {
                EditionPolicy::FirstNumeric => "<numeric id>".to_string(),
                EditionPolicy::Exact(v) => v.clone(),
            },
        }
    })?;
    tracing::debug!(edition, offered = editions.len(), "selecting edition");
    session.select_option(&layout.edition_select, edition).await?;

    wait_until_interactable(session, target, &layout.edition_submit, Step::EditionSubmit).await?;
    target.pacing.pause().await;
    session.click(&layout.edition_submit).await?;

    wait_until_interactable(session, target, &layout.language_select, Step::Language).await?;
    target.pacing.pause().await;
    let languages = session.option_values(&layout.language_select).await?;
    let language = pick_language(&languages, &target.language).ok_or_else(|| {
        NavigationError::SelectionNotFound {
            control: Step::Language,
            wanted: target.language.clone(),
        }
    })?;
    tracing::debug!(payload = language, "selecting language");
    session.select_option(&layout.language_select, language).await?;

    wait_until_interactable(session, target, &layout.language_submit, Step::LanguageSubmit).await?;
    target.pacing.pause().await;
    session.click(&layout.language_submit).await?;

    wait_until_interactable(session, target, &layout.download_marker, Step::DownloadLinks).await?;
    target.pacing.pause().await;
    let href = session
        .download_href(&layout.download_marker, target.link_text.as_deref())
        .await?
        .filter(|h| !h.trim().is_empty())
        .ok_or(NavigationError::MissingLink)?;
    let link = DownloadLink::parse(&href)?;
    tracing::info!(file = link.file_name(), "resolved download link");
    Ok(link)
}

/// Poll until `selector` is interactable or the step deadline passes.
///
/// Readiness check errors count as "not ready yet": the page is often mid-navigation
/// right after a submit. A timeout saves diagnostics when a dump directory is
/// configured.
async fn wait_until_interactable<S>(
    session: &mut S,
    target: &NavigationTarget,
    selector: &str,
    step: Step,
) -> Result<(), NavigationError>
where
    S: BrowserSession + ?Sized,
{
    let deadline = Instant::now() + target.timeout;
    loop {
        match timeout_at(deadline, session.is_interactable(selector)).await {
            Ok(Ok(true)) => return Ok(()),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => tracing::debug!(%step, "readiness check failed: {}", e),
            Err(_) => break,
        }
        if Instant::now() + target.poll_interval >= deadline {
            tokio::time::sleep_until(deadline).await;
            break;
        }
        tokio::time::sleep(target.poll_interval).await;
    }

    tracing::warn!(%step, timeout = ?target.timeout, "control never became interactable");
    if let Some(dir) = &target.dump_dir {
        match session.capture(dir, step.label()).await {
            Ok(()) => tracing::info!("saved page diagnostics to {}", dir.display()),
            Err(e) => tracing::warn!("could not save page diagnostics: {}", e),
        }
    }
    Err(NavigationError::Timeout {
        step,
        timeout: target.timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigate::session::BrowserError;
    use crate::navigate::{Pacing, PageLayout};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    /// Scripted page: controls become ready after a number of checks.
    #[derive(Default)]
    struct FakePage {
        ready_after: HashMap<String, u32>,
        never_ready: HashSet<String>,
        checks: HashMap<String, u32>,
        options: HashMap<String, Vec<String>>,
        href: Option<String>,
        calls: Vec<String>,
        captured: Vec<(PathBuf, String)>,
    }

    impl FakePage {
        fn form(editions: &[&str], languages: &[&str], href: Option<&str>) -> Self {
            let layout = PageLayout::default();
            let mut options = HashMap::new();
            options.insert(
                layout.edition_select,
                editions.iter().map(|s| s.to_string()).collect(),
            );
            options.insert(
                layout.language_select,
                languages.iter().map(|s| s.to_string()).collect(),
            );
            Self {
                options,
                href: href.map(str::to_string),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BrowserSession for FakePage {
        async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
            self.calls.push(format!("goto {url}"));
            Ok(())
        }

        async fn is_interactable(&mut self, selector: &str) -> Result<bool, BrowserError> {
            if self.never_ready.contains(selector) {
                return Ok(false);
            }
            let n = self.checks.entry(selector.to_string()).or_default();
            *n += 1;
            Ok(*n > self.ready_after.get(selector).copied().unwrap_or(0))
        }

        async fn option_values(&mut self, select: &str) -> Result<Vec<String>, BrowserError> {
            Ok(self.options.get(select).cloned().unwrap_or_default())
        }

        async fn select_option(&mut self, select: &str, value: &str) -> Result<(), BrowserError> {
            self.calls.push(format!("select {select}={value}"));
            Ok(())
        }

        async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
            self.calls.push(format!("click {selector}"));
            Ok(())
        }

        async fn download_href(
            &mut self,
            marker: &str,
            link_text: Option<&str>,
        ) -> Result<Option<String>, BrowserError> {
            self.calls
                .push(format!("href {marker} {}", link_text.unwrap_or("-")));
            Ok(self.href.clone())
        }

        async fn capture(&mut self, dir: &Path, label: &str) -> Result<(), BrowserError> {
            self.captured.push((dir.to_path_buf(), label.to_string()));
            Ok(())
        }
    }

    fn target(language: &str) -> NavigationTarget {
        NavigationTarget {
            url: "https://example.com/form".into(),
            edition: EditionPolicy::FirstNumeric,
            language: language.into(),
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
            pacing: Pacing::Disabled,
            link_text: Some("64-bit Download".into()),
            dump_dir: None,
            layout: PageLayout::default(),
        }
    }

    const ISO: &str = "https://dl.example.com/Win11_English_x64.iso?t=1";

    #[tokio::test(start_paused = true)]
    async fn walks_form_and_returns_link() {
        let mut page = FakePage::form(
            &["", "5", "6"],
            &[r#"{"language":"French"}"#, r#"{"language":"English"}"#],
            Some(ISO),
        );
        page.ready_after.insert("#product-languages".into(), 3);

        let link = resolve_link(&mut page, &target("English")).await.unwrap();
        assert_eq!(link.as_str(), ISO);
        assert_eq!(link.file_name(), "Win11_English_x64.iso");
        assert_eq!(
            page.calls,
            vec![
                "goto https://example.com/form".to_string(),
                "select #product-edition=5".to_string(),
                "click #submit-product-edition".to_string(),
                r#"select #product-languages={"language":"English"}"#.to_string(),
                "click #submit-sku".to_string(),
                "href .product-download-type 64-bit Download".to_string(),
            ]
        );
        assert_eq!(page.checks["#product-languages"], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_language_stops_before_submit() {
        let mut page = FakePage::form(
            &["", "5"],
            &["", r#"{"language":"French"}"#, "{broken"],
            Some(ISO),
        );
        let err = resolve_link(&mut page, &target("English")).await.unwrap_err();
        assert!(matches!(
            err,
            NavigationError::SelectionNotFound {
                control: Step::Language,
                ref wanted
            } if wanted == "English"
        ));
        assert!(!page.calls.iter().any(|c| c.contains("#submit-sku")));
        assert!(!page.calls.iter().any(|c| c.starts_with("href")));
    }

    #[tokio::test(start_paused = true)]
    async fn no_numeric_edition_fails_first_selection() {
        let mut page = FakePage::form(&["", "n/a"], &[], Some(ISO));
        let err = resolve_link(&mut page, &target("English")).await.unwrap_err();
        assert!(matches!(
            err,
            NavigationError::SelectionNotFound {
                control: Step::Edition,
                ..
            }
        ));
        assert_eq!(page.calls.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_captures_diagnostics_and_stops() {
        let mut page = FakePage::form(&["5"], &[r#"{"language":"English"}"#], Some(ISO));
        page.never_ready.insert("#submit-sku".into());
        let mut t = target("English");
        t.dump_dir = Some(PathBuf::from("/dump"));

        let started = Instant::now();
        let err = resolve_link(&mut page, &t).await.unwrap_err();
        assert!(matches!(
            err,
            NavigationError::Timeout {
                step: Step::LanguageSubmit,
                ..
            }
        ));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(
            page.captured,
            vec![(PathBuf::from("/dump"), "submit-sku".to_string())]
        );
        assert!(!page.calls.iter().any(|c| c.starts_with("click #submit-sku")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_dump_dir_captures_nothing() {
        let mut page = FakePage::form(&["5"], &[], Some(ISO));
        page.never_ready.insert("#product-edition".into());
        let err = resolve_link(&mut page, &target("English")).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(page.captured.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_href_is_missing_link() {
        let mut page = FakePage::form(&["5"], &[r#"{"language":"English"}"#], Some("  "));
        let err = resolve_link(&mut page, &target("English")).await.unwrap_err();
        assert!(matches!(err, NavigationError::MissingLink));

        let mut page = FakePage::form(&["5"], &[r#"{"language":"English"}"#], None);
        let err = resolve_link(&mut page, &target("English")).await.unwrap_err();
        assert!(matches!(err, NavigationError::MissingLink));
    }

    #[tokio::test(start_paused = true)]
    async fn href_without_file_name_is_rejected() {
        let mut page = FakePage::form(
            &["5"],
            &[r#"{"language":"English"}"#],
            Some("https://dl.example.com/"),
        );
        let err = resolve_link(&mut page, &target("English")).await.unwrap_err();
        assert!(matches!(err, NavigationError::BadLink(_)));
    }
}
