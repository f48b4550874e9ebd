//! HTML digest rendering for mail delivery.
//!
//! The digest opens with a dated heading and a per-provider count table,
//! followed by one section per provider (Azure, AWS, GCP) that has items.
//! All interpolated text is HTML-escaped.

use crate::delivery::Artifact;
use crate::models::{Aggregator, Provider, UpdateItem};
use crate::window::DateWindow;
use chrono::NaiveDate;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt;
use tracing::{info, instrument};

/// Mail subject for the digest sent on `today`.
pub fn subject(today: NaiveDate) -> String {
    format!("[Cloud Updates] 이번 주 소식지 ({today})")
}

/// Render the digest mail for `aggregator`.
#[instrument(level = "info", skip_all, fields(%today, items = aggregator.len()))]
pub fn render_digest(aggregator: &Aggregator, window: &DateWindow, today: NaiveDate) -> Artifact {
    let html = Digest {
        aggregator,
        window,
        today,
    }
    .to_string();
    info!(bytes = html.len(), "Rendered HTML digest");
    Artifact {
        subject: subject(today),
        html,
    }
}

fn icon(provider: Provider) -> &'static str {
    match provider {
        Provider::Azure => "🔷",
        Provider::Aws => "🟧",
        Provider::Gcp => "🟩",
    }
}

struct Digest<'a> {
    aggregator: &'a Aggregator,
    window: &'a DateWindow,
    today: NaiveDate,
}

impl fmt::Display for Digest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<h2>📢 클라우드 주간 업데이트 ({})</h2>", self.today)?;
        writeln!(
            f,
            "<p>수집 기간: {} ~ {}</p>",
            self.window.start(),
            self.window.end()
        )?;
        self.count_table(f)?;
        for provider in Provider::ALL {
            let items: Vec<&UpdateItem> = self.aggregator.by_source(provider).collect();
            if items.is_empty() {
                continue;
            }
            writeln!(f, "<h3>{} {} 업데이트</h3>", icon(provider), provider)?;
            writeln!(f, "<ul>")?;
            for item in items {
                write_item(f, item)?;
            }
            writeln!(f, "</ul>")?;
        }
        Ok(())
    }
}

impl Digest<'_> {
    fn count_table(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.aggregator.len();
        writeln!(
            f,
            "<table border=\"1\" cellpadding=\"4\" \
             style=\"border-collapse: collapse; margin-bottom: 20px;\">"
        )?;
        writeln!(f, "<tr><th>클라우드</th><th>건수</th><th>비율</th></tr>")?;
        for provider in Provider::ALL {
            let count = self.aggregator.count_for(provider);
            let percent = if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            };
            writeln!(
                f,
                "<tr><td>{} {}</td><td>{}건</td><td>{:.1}%</td></tr>",
                icon(provider),
                provider,
                count,
                percent
            )?;
        }
        writeln!(f, "<tr><td>합계</td><td>{total}건</td><td></td></tr>")?;
        writeln!(f, "</table>")
    }
}

fn write_item(f: &mut fmt::Formatter<'_>, item: &UpdateItem) -> fmt::Result {
    let note = if item.source == Provider::Gcp {
        format!(" (날짜: {})", item.date)
    } else {
        String::new()
    };
    writeln!(
        f,
        "<li style=\"margin-bottom: 20px;\"><strong>{}</strong> - <strong>{}</strong><br>{} \
         <a href=\"{}\" style=\"color: blue;\">자세히 보기{}</a></li>",
        item.date,
        encode_text(&item.title),
        encode_text(&item.summary),
        encode_double_quoted_attribute(&item.link),
        note
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: Provider, title: &str, day: u32) -> UpdateItem {
        UpdateItem {
            source,
            title: title.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            content: String::new(),
            link: format!("https://example.com/{day}?a=1&b=\"2\""),
            summary: format!("{title} summary"),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()
    }

    #[test]
    fn test_subject() {
        assert_eq!(subject(today()), "[Cloud Updates] 이번 주 소식지 (2024-06-07)");
    }

    #[test]
    fn test_sections_follow_provider_order() {
        let mut aggregator = Aggregator::new();
        aggregator.extend([
            item(Provider::Gcp, "Cloud Run (Feature)", 5),
            item(Provider::Aws, "Amazon S3", 4),
            item(Provider::Azure, "Azure Files", 3),
        ]);
        let artifact = render_digest(&aggregator, &DateWindow::compute(today()), today());

        let html = &artifact.html;
        let azure = html.find("🔷 Azure 업데이트").unwrap();
        let aws = html.find("🟧 AWS 업데이트").unwrap();
        let gcp = html.find("🟩 GCP 업데이트").unwrap();
        assert!(azure < aws && aws < gcp);
        assert!(html.contains("<h2>📢 클라우드 주간 업데이트 (2024-06-07)</h2>"));
        assert!(html.contains("자세히 보기 (날짜: 2024-06-05)"));
        assert!(html.contains("<p>수집 기간: 2024-06-03 ~ 2024-06-09</p>"));
        assert_eq!(html.matches("<li ").count(), 3);
    }

    #[test]
    fn test_empty_provider_has_no_section_but_keeps_count_row() {
        let mut aggregator = Aggregator::new();
        aggregator.extend([item(Provider::Aws, "Amazon S3", 4)]);
        let html = render_digest(&aggregator, &DateWindow::compute(today()), today()).html;

        assert!(!html.contains("Azure 업데이트"));
        assert!(html.contains("<tr><td>🔷 Azure</td><td>0건</td><td>0.0%</td></tr>"));
        assert!(html.contains("<tr><td>🟧 AWS</td><td>1건</td><td>100.0%</td></tr>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut aggregator = Aggregator::new();
        aggregator.extend([item(Provider::Azure, "<script>alert(1)</script> & more", 4)]);
        let html = render_digest(&aggregator, &DateWindow::compute(today()), today()).html;

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; more"));
        assert!(html.contains("href=\"https://example.com/4?a=1&amp;b=&quot;2&quot;\""));
    }
}
