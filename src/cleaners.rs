//! Ready-made cleaners.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::cleaner::{output_from, Cleaner, CleanerOutput, Emit, OutputFormat, OutputTarget};
use crate::error::{Result, ScrapeError};
use crate::scheduler::job::NewJob;

/// One `<a href>` found on a page, resolved against the page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub source: String,
    pub href: String,
    pub text: String,
}

/// Per-page summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub depth: usize,
    pub links: usize,
}

/// Settings and visited-set shared by every page of one link crawl.
#[derive(Debug)]
pub struct LinkCrawl {
    max_depth: usize,
    output: Option<OutputTarget>,
    format: OutputFormat,
    seen: Mutex<HashSet<String>>,
}

impl LinkCrawl {
    /// `max_depth` 0 records links of the seed pages only; each extra level
    /// follows same-host links one hop further.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            output: None,
            format: OutputFormat::Csv,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_output(mut self, output: Option<OutputTarget>) -> Self {
        self.output = output;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Seed job for `url`.
    pub fn job(self: &Arc<Self>, url: &str) -> Result<NewJob> {
        let page = Url::parse(url)
            .map_err(|e| ScrapeError::Cleaner(format!("invalid url {:?}: {}", url, e)))?;
        self.mark_seen(&page);
        Ok(self.job_for(page, 0))
    }

    fn job_for(self: &Arc<Self>, page: Url, depth: usize) -> NewJob {
        let url = page.to_string();
        let cleaner = LinkCleaner {
            page,
            depth,
            crawl: self.clone(),
        };
        NewJob::new(url, Arc::new(cleaner))
    }

    /// Returns false if the URL was already scheduled.
    fn mark_seen(&self, url: &Url) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string())
    }
}

/// Emits a [`Page`] and one [`Link`] per anchor, and follows same-host
/// links until the crawl's depth limit.
#[derive(Debug)]
pub struct LinkCleaner {
    page: Url,
    depth: usize,
    crawl: Arc<LinkCrawl>,
}

impl LinkCleaner {
    fn resolve(&self, href: &str) -> Option<Url> {
        let mut url = self.page.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_fragment(None);
        Some(url)
    }

    fn should_follow(&self, url: &Url) -> bool {
        self.depth < self.crawl.max_depth
            && url.host_str() == self.page.host_str()
            && self.crawl.mark_seen(url)
    }
}

impl Cleaner for LinkCleaner {
    fn clean_text(&self, text: &str) -> Result<CleanerOutput> {
        let document = Html::parse_document(text);
        let anchors = selector("a[href]")?;
        let title_selector = selector("title")?;

        let title = document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let mut links = Vec::new();
        let mut follow = Vec::new();
        for anchor in document.select(&anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = self.resolve(href) else {
                continue;
            };
            let text = anchor.text().collect::<Vec<_>>().join(" ");
            links.push(Link {
                source: self.page.to_string(),
                href: url.to_string(),
                text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            });
            if self.should_follow(&url) {
                follow.push(url);
            }
        }

        let mut emitted = Vec::with_capacity(links.len() + follow.len() + 1);
        emitted.push(Emit::record(&Page {
            url: self.page.to_string(),
            title,
            depth: self.depth,
            links: links.len(),
        }));
        for url in follow {
            emitted.push(Ok(Emit::job(self.crawl.job_for(url, self.depth + 1))));
        }
        emitted.extend(links.iter().map(Emit::record));

        Ok(output_from(emitted))
    }

    fn output(&self) -> Option<OutputTarget> {
        self.crawl.output.clone()
    }

    fn format(&self) -> OutputFormat {
        self.crawl.format
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Cleaner(format!("bad selector {:?}: {}", css, e)))
}
