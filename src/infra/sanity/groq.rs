//! GROQ queries issued against the content store.

/// Projection shared by every listable post.
macro_rules! post_fields {
    () => {
        r#"_id,
  title,
  "slug": slug.current,
  excerpt,
  publishedAt,
  "mainImage": mainImage{ "url": asset->url, alt },
  author->{ name, "image": image.asset->url },
  categories[]->{ title }"#
    };
}

/// Posts in `[$start, $end)`, newest first.
pub const PAGE_QUERY: &str = concat!(
    r#"*[_type == "post" && defined(slug.current)] | order(publishedAt desc)[$start...$end] {
  "#,
    post_fields!(),
    "\n}"
);

/// A single post with its body, or `null`.
pub const POST_BY_SLUG_QUERY: &str = concat!(
    r#"*[_type == "post" && slug.current == $slug][0] {
  "#,
    post_fields!(),
    r#",
  body[]{ ..., _type == "image" => { "url": asset->url, alt, caption } }
}"#
);
