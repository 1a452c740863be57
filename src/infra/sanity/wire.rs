//! Raw query results and their validation into domain records.
//!
//! The store is schemaless from our side: every field is optional on the
//! wire and checked here. Records missing a required field are dropped.

use std::collections::HashMap;

use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, warn};
use url::Url;

use crate::domain::posts::{
    AuthorRef, BlockStyle, BodyBlock, CategoryLabel, ImageRef, PostDetail, PostSummary, SpanMarks,
    TextSpan,
};

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub(crate) result: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPost {
    #[serde(rename = "_id")]
    id: Option<String>,
    title: Option<String>,
    slug: Option<String>,
    excerpt: Option<String>,
    published_at: Option<String>,
    main_image: Option<RawImage>,
    author: Option<RawAuthor>,
    categories: Option<Vec<Option<RawCategory>>>,
    body: Option<Vec<RawBlock>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawImage {
    url: Option<String>,
    alt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAuthor {
    name: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCategory {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawBlock {
    #[serde(rename = "_type")]
    kind: Option<String>,
    style: Option<String>,
    list_item: Option<String>,
    children: Option<Vec<RawSpan>>,
    mark_defs: Option<Vec<RawMarkDef>>,
    url: Option<String>,
    alt: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSpan {
    text: Option<String>,
    marks: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMarkDef {
    #[serde(rename = "_key")]
    key: Option<String>,
    #[serde(rename = "_type")]
    kind: Option<String>,
    href: Option<String>,
}

/// Posts decoded from one page result.
#[derive(Debug, Default)]
pub(crate) struct DecodedPage {
    pub(crate) posts: Vec<PostSummary>,
    /// Records present in the result but rejected as malformed.
    pub(crate) dropped: usize,
}

/// Decode a page result. Anything other than an array is an empty page.
///
/// Dropped records shorten the page, and a short page ends the list, so
/// a malformed record near the end of a full page hides the posts after it.
pub(crate) fn decode_page(result: Option<Value>) -> DecodedPage {
    let Some(Value::Array(records)) = result else {
        debug!(
            target = "travelora::sanity",
            "query result is not an array; treating as empty page"
        );
        return DecodedPage::default();
    };

    let total = records.len();
    let posts: Vec<PostSummary> = records
        .into_iter()
        .filter_map(|record| decode_record(record).map(|(summary, _)| summary))
        .collect();
    DecodedPage {
        dropped: total - posts.len(),
        posts,
    }
}

/// Decode a single-post result. `null` means no post matched.
pub(crate) fn decode_detail(result: Option<Value>) -> Option<PostDetail> {
    match result {
        Some(record @ Value::Object(_)) => {
            let (summary, body) = decode_record(record)?;
            Some(PostDetail {
                summary,
                body: body.into_iter().filter_map(decode_block).collect(),
            })
        }
        _ => None,
    }
}

fn decode_record(record: Value) -> Option<(PostSummary, Vec<RawBlock>)> {
    let raw: RawPost = match serde_json::from_value(record) {
        Ok(raw) => raw,
        Err(err) => {
            drop_record(None, "record", &err.to_string());
            return None;
        }
    };

    let id = raw.id.clone();
    match validate(raw) {
        Ok(decoded) => Some(decoded),
        Err((field, reason)) => {
            drop_record(id.as_deref(), field, reason);
            None
        }
    }
}

fn validate(raw: RawPost) -> Result<(PostSummary, Vec<RawBlock>), (&'static str, &'static str)> {
    let id = required(raw.id, "_id")?;
    let title = required(raw.title, "title")?;
    let slug = required(raw.slug, "slug")?;
    let published_at = required(raw.published_at, "publishedAt")?;
    let published_at = OffsetDateTime::parse(&published_at, &Rfc3339)
        .map_err(|_| ("publishedAt", "not an RFC 3339 timestamp"))?;

    let main_image = raw.main_image.and_then(|image| {
        image
            .url
            .filter(|url| !url.is_empty())
            .map(|url| ImageRef {
                url,
                alt: image.alt.filter(|alt| !alt.trim().is_empty()),
            })
    });

    let author = raw.author.and_then(|author| {
        author
            .name
            .filter(|name| !name.trim().is_empty())
            .map(|name| AuthorRef {
                name,
                image: author.image,
            })
    });

    let categories = raw.categories.map(|categories| {
        categories
            .into_iter()
            .flatten()
            .filter_map(|category| category.title)
            .map(|title| CategoryLabel { title })
            .collect()
    });

    let summary = PostSummary {
        id,
        title,
        slug,
        excerpt: raw.excerpt.unwrap_or_default(),
        published_at,
        main_image,
        author,
        categories,
    };

    Ok((summary, raw.body.unwrap_or_default()))
}

fn required(
    value: Option<String>,
    field: &'static str,
) -> Result<String, (&'static str, &'static str)> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err((field, "missing or empty")),
    }
}

fn drop_record(id: Option<&str>, field: &str, reason: &str) {
    counter!("travelora_dropped_records_total").increment(1);
    warn!(
        target = "travelora::sanity",
        id = id.unwrap_or("<unknown>"),
        field,
        reason,
        "dropping malformed post record"
    );
}

fn decode_block(block: RawBlock) -> Option<BodyBlock> {
    match block.kind.as_deref() {
        Some("block") => {
            let links: HashMap<String, String> = block
                .mark_defs
                .unwrap_or_default()
                .into_iter()
                .filter(|def| def.kind.as_deref() == Some("link"))
                .filter_map(|def| Some((def.key?, def.href.as_deref().and_then(safe_href)?)))
                .collect();
            let spans = block
                .children
                .unwrap_or_default()
                .into_iter()
                .filter_map(|span| decode_span(span, &links))
                .collect();
            Some(BodyBlock::Text {
                style: block_style(block.style.as_deref(), block.list_item.as_deref()),
                spans,
            })
        }
        Some("image") => block.url.map(|url| BodyBlock::Image {
            url,
            alt: block.alt,
            caption: block.caption,
        }),
        other => {
            debug!(
                target = "travelora::sanity",
                kind = other.unwrap_or("<none>"),
                "skipping unsupported body block"
            );
            None
        }
    }
}

fn decode_span(span: RawSpan, links: &HashMap<String, String>) -> Option<TextSpan> {
    let text = span.text?;
    let mut marks = SpanMarks::default();
    let mut link = None;
    for mark in span.marks.unwrap_or_default() {
        match mark.as_str() {
            "strong" => marks.strong = true,
            "em" => marks.emphasis = true,
            "code" => marks.code = true,
            key => {
                if let Some(href) = links.get(key) {
                    link = Some(href.clone());
                }
            }
        }
    }
    Some(TextSpan { text, marks, link })
}

/// Site-relative paths and http(s)/mailto urls; anything else renders as text.
fn safe_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with('/') && !href.starts_with("//") {
        return Some(href.to_string());
    }
    match Url::parse(href) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "mailto") => Some(href.to_string()),
        _ => {
            debug!(target = "travelora::sanity", href, "dropping unsupported link");
            None
        }
    }
}

fn block_style(style: Option<&str>, list_item: Option<&str>) -> BlockStyle {
    match (list_item, style) {
        (Some("bullet"), _) => BlockStyle::BulletItem,
        (Some("number"), _) => BlockStyle::NumberItem,
        (_, Some("h1")) => BlockStyle::Heading(1),
        (_, Some("h2")) => BlockStyle::Heading(2),
        (_, Some("h3")) => BlockStyle::Heading(3),
        (_, Some("h4" | "h5" | "h6")) => BlockStyle::Heading(4),
        (_, Some("blockquote")) => BlockStyle::Quote,
        _ => BlockStyle::Paragraph,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(id: &str) -> Value {
        json!({
            "_id": id,
            "title": "Lisbon by tram",
            "slug": format!("lisbon-{id}"),
            "excerpt": "Hills and tiles",
            "publishedAt": "2024-03-05T09:30:00Z",
            "mainImage": { "url": "https://cdn.example/lisbon.jpg", "alt": "Tram 28" },
            "author": { "name": "Ana", "image": null },
            "categories": [{ "title": "Portugal" }, null]
        })
    }

    #[test]
    fn decodes_complete_records() {
        let page = decode_page(Some(json!([record("a"), record("b")]))).posts;
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].slug, "lisbon-a");
        assert_eq!(page[0].categories().len(), 1);
        assert_eq!(
            page[0].main_image.as_ref().and_then(|image| image.alt.as_deref()),
            Some("Tram 28")
        );
    }

    #[test]
    fn drops_records_missing_required_fields() {
        let mut no_slug = record("b");
        no_slug["slug"] = Value::Null;
        let mut bad_date = record("c");
        bad_date["publishedAt"] = json!("yesterday");

        let page = decode_page(Some(json!([record("a"), no_slug, bad_date, 42])));
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].id, "a");
        assert_eq!(page.dropped, 3);
    }

    #[test]
    fn non_array_result_is_empty_page() {
        assert!(decode_page(None).posts.is_empty());
        assert!(decode_page(Some(Value::Null)).posts.is_empty());
        assert!(decode_page(Some(json!({ "_id": "a" }))).posts.is_empty());
    }

    #[test]
    fn missing_excerpt_becomes_empty() {
        let mut raw = record("a");
        if let Some(object) = raw.as_object_mut() {
            object.remove("excerpt");
        }
        let page = decode_page(Some(json!([raw]))).posts;
        assert_eq!(page[0].excerpt, "");
    }

    #[test]
    fn decodes_body_blocks() {
        let mut raw = record("a");
        raw["body"] = json!([
            { "_type": "block", "style": "h2", "children": [{ "text": "Day one" }] },
            { "_type": "block", "style": "normal", "listItem": "bullet",
              "children": [{ "text": "Pastel " }, { "text": "de nata" }] },
            { "_type": "image", "url": "https://cdn.example/x.jpg", "caption": "Alfama" },
            { "_type": "code", "code": "ignored" }
        ]);

        let detail = decode_detail(Some(raw)).expect("detail");
        assert_eq!(detail.body.len(), 3);
        assert_eq!(
            detail.body[1],
            BodyBlock::Text {
                style: BlockStyle::BulletItem,
                spans: vec![TextSpan::plain("Pastel "), TextSpan::plain("de nata")],
            }
        );
        assert!(matches!(detail.body[2], BodyBlock::Image { .. }));
    }

    #[test]
    fn spans_keep_marks_and_links() {
        let mut raw = record("a");
        raw["body"] = json!([{
            "_type": "block",
            "style": "normal",
            "markDefs": [
                { "_key": "k1", "_type": "link", "href": "https://www.cp.pt" },
                { "_key": "k2", "_type": "link", "href": "javascript:alert(1)" },
                { "_key": "k3", "_type": "link", "href": "/blog/porto" }
            ],
            "children": [
                { "text": "Take ", "marks": [] },
                { "text": "the train", "marks": ["strong", "k1"] },
                { "text": " or ", "marks": ["underline", "k2"] },
                { "text": "read on", "marks": ["em", "k3"] },
                { "text": "cp", "marks": ["code"] }
            ]
        }]);

        let detail = decode_detail(Some(raw)).expect("detail");
        let BodyBlock::Text { spans, .. } = &detail.body[0] else {
            panic!("expected text block");
        };
        assert_eq!(spans.len(), 5);
        assert!(spans[1].marks.strong);
        assert_eq!(spans[1].link.as_deref(), Some("https://www.cp.pt"));
        assert_eq!(spans[2].link, None);
        assert_eq!(spans[2].marks, SpanMarks::default());
        assert!(spans[3].marks.emphasis);
        assert_eq!(spans[3].link.as_deref(), Some("/blog/porto"));
        assert!(spans[4].marks.code);
    }

    #[test]
    fn null_detail_is_none() {
        assert!(decode_detail(Some(Value::Null)).is_none());
        assert!(decode_detail(None).is_none());
    }
}
