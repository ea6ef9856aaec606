//! Cache key layout.
//!
//! Keys are plain strings shared with the other processes reading the same
//! backend, so their shape is part of the external contract.

/// Namespace of search listings (`blog:list:page_{page}_per_{per_page}`).
pub const LIST_NAMESPACE: &str = "blog:list:";
/// Namespace of published-post index pages (`blog_posts.{page}`).
pub const INDEX_NAMESPACE: &str = "blog_posts.";
/// Namespace of single post detail entries (`blog_post.{id}`).
pub const DETAIL_NAMESPACE: &str = "blog_post.";
/// Namespace of search index entries (`post:{id}`).
pub const SEARCH_NAMESPACE: &str = "post:";
/// Suffix of the master registry key inside a list namespace.
pub const REGISTRY_SUFFIX: &str = "keys";

pub fn list_page_key(page: u32, per_page: u32) -> String {
    format!("page_{page}_per_{per_page}")
}

pub fn index_page_key(page: u32) -> String {
    page.to_string()
}

pub fn detail_key(post_id: i64) -> String {
    post_id.to_string()
}

pub fn search_key(post_id: i64) -> String {
    format!("{SEARCH_NAMESPACE}{post_id}")
}

/// Recover the post id from a search index key.
pub fn post_id_from_search_key(key: &str) -> Option<i64> {
    key.strip_prefix(SEARCH_NAMESPACE)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_namespace_layout() {
        assert_eq!(
            format!("{LIST_NAMESPACE}{}", list_page_key(2, 15)),
            "blog:list:page_2_per_15"
        );
        assert_eq!(format!("{INDEX_NAMESPACE}{}", index_page_key(3)), "blog_posts.3");
        assert_eq!(format!("{DETAIL_NAMESPACE}{}", detail_key(42)), "blog_post.42");
        assert_eq!(
            format!("{LIST_NAMESPACE}{REGISTRY_SUFFIX}"),
            "blog:list:keys"
        );
    }

    #[test]
    fn search_keys_round_trip_ids() {
        assert_eq!(search_key(17), "post:17");
        assert_eq!(post_id_from_search_key("post:17"), Some(17));
        assert_eq!(post_id_from_search_key("post:abc"), None);
        assert_eq!(post_id_from_search_key("blog_post.17"), None);
    }
}
