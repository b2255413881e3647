//! Resource URL construction
//!
//! Local paths become `file://` URLs with forward slashes and
//! percent-encoded segments; remote locators pass through untouched.
//! Local locators that already carry the `file://` scheme are normalised
//! the same way, keeping their existing `%XX` escapes, so feeding a built
//! URL back in returns it unchanged.

use crate::catalog::CatalogItem;

const FILE_SCHEME_PREFIX: &str = "file://";

/// URL handed to the host media stack for an item
pub fn resource_url(item: &CatalogItem) -> String {
    if !item.is_local {
        return item.locator.clone();
    }
    match strip_file_scheme(&item.locator) {
        Some(rest) => file_url_to_url(rest),
        None => local_path_to_url(&item.locator),
    }
}

/// Convert a local filesystem path into a `file://` URL
///
/// Both `/` and `\` are treated as separators regardless of the host
/// platform. Empty segments are dropped, a leading drive letter (`C:`) is
/// kept verbatim and a leading `\\server\share` becomes the URL host.
pub fn local_path_to_url(path: &str) -> String {
    build_url(path, false)
}

/// Normalise the part of a `file://` URL after the scheme
///
/// `file:///path` and `file://C:\path` carry a path; anything else starts
/// with a host (`file://server/share`).
fn file_url_to_url(rest: &str) -> String {
    if rest.starts_with(['/', '\\']) || starts_with_drive_letter(rest) {
        build_url(rest, true)
    } else {
        build_url(&format!("//{}", rest), true)
    }
}

fn build_url(path: &str, keep_escapes: bool) -> String {
    let normalized = path.replace('\\', "/");
    let is_unc = normalized.starts_with("//");

    let mut segments = normalized.split('/').filter(|segment| !segment.is_empty());
    let mut url = String::with_capacity(normalized.len() + FILE_SCHEME_PREFIX.len() + 8);
    url.push_str(FILE_SCHEME_PREFIX);

    if is_unc {
        if let Some(host) = segments.next() {
            push_encoded(&mut url, host, keep_escapes);
        }
    }

    let mut first = true;
    for segment in segments {
        url.push('/');
        if first && !is_unc && is_drive_letter(segment) {
            url.push_str(segment);
        } else {
            push_encoded(&mut url, segment, keep_escapes);
        }
        first = false;
    }

    if first {
        // Root or empty path
        url.push('/');
    }

    url
}

/// Percent-encode `segment`; with `keep_escapes` valid `%XX` sequences are
/// copied through instead of becoming `%25XX`
fn push_encoded(url: &mut String, segment: &str, keep_escapes: bool) {
    if !keep_escapes {
        url.push_str(&urlencoding::encode(segment));
        return;
    }

    let bytes = segment.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let is_escape = bytes[i] == b'%'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
            && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
        if is_escape {
            url.push_str(&urlencoding::encode(&segment[start..i]));
            url.push_str(&segment[i..i + 3]);
            i += 3;
            start = i;
        } else {
            i += 1;
        }
    }
    url.push_str(&urlencoding::encode(&segment[start..]));
}

fn strip_file_scheme(locator: &str) -> Option<&str> {
    locator
        .get(..FILE_SCHEME_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(FILE_SCHEME_PREFIX))
        .map(|_| &locator[FILE_SCHEME_PREFIX.len()..])
}

fn starts_with_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes.get(2).map_or(true, |&b| b == b'/' || b == b'\\')
}

fn is_drive_letter(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_path() {
        assert_eq!(
            local_path_to_url("/home/me/My Videos/clip #1.mp4"),
            "file:///home/me/My%20Videos/clip%20%231.mp4"
        );
    }

    #[test]
    fn test_windows_path_uses_forward_slashes() {
        let url = local_path_to_url("C:\\Users\\me\\Videos\\a b.mp4");
        assert_eq!(url, "file:///C:/Users/me/Videos/a%20b.mp4");
        assert!(!url.contains('\\'));
    }

    #[test]
    fn test_mixed_separators_and_duplicate_slashes() {
        assert_eq!(
            local_path_to_url("D:/media\\\\clips//x.webm"),
            "file:///D:/media/clips/x.webm"
        );
    }

    #[test]
    fn test_unc_path_becomes_host() {
        assert_eq!(
            local_path_to_url("\\\\nas\\share\\movie.mkv"),
            "file://nas/share/movie.mkv"
        );
    }

    #[test]
    fn test_reserved_characters_encoded() {
        let url = local_path_to_url("/v/a?b%c&d+e;f.mp4");
        assert_eq!(url, "file:///v/a%3Fb%25c%26d%2Be%3Bf.mp4");
    }

    #[test]
    fn test_unicode_segment_encoded() {
        assert_eq!(local_path_to_url("/v/café.mp4"), "file:///v/caf%C3%A9.mp4");
    }

    #[test]
    fn test_colon_outside_drive_position_encoded() {
        assert_eq!(local_path_to_url("/v/C:/x.mp4"), "file:///v/C%3A/x.mp4");
    }

    #[test]
    fn test_root_and_empty() {
        assert_eq!(local_path_to_url("/"), "file:///");
        assert_eq!(local_path_to_url(""), "file:///");
    }

    #[test]
    fn test_idempotent_and_no_encoded_backslash() {
        let path = "C:\\My Clips\\#tag/mixed\\sep arator.mp4";
        let first = local_path_to_url(path);
        let second = local_path_to_url(path);
        assert_eq!(first, second);
        assert!(!first.to_ascii_uppercase().contains("%5C"));
        assert!(!first.contains('\\'));
    }

    #[test]
    fn test_remote_passes_through_and_encoded_file_url_kept() {
        let remote = CatalogItem::remote("https://cdn.example.com/a b.mp4");
        assert_eq!(resource_url(&remote), "https://cdn.example.com/a b.mp4");

        let file_url = CatalogItem::local("file:///already/encoded%20name.mp4");
        assert_eq!(resource_url(&file_url), "file:///already/encoded%20name.mp4");
    }

    #[test]
    fn test_raw_file_url_normalised() {
        let item = CatalogItem::from_locator("file://C:\\My Videos\\a #1.mp4");
        assert!(item.is_local);
        let url = resource_url(&item);
        assert_eq!(url, "file:///C:/My%20Videos/a%20%231.mp4");

        let rebuilt = CatalogItem::from_locator(url.clone());
        assert_eq!(resource_url(&rebuilt), url);
    }

    #[test]
    fn test_file_url_with_spaces_and_host() {
        let item = CatalogItem::from_locator("file:///srv/my clips/50% off.mp4");
        assert_eq!(resource_url(&item), "file:///srv/my%20clips/50%25%20off.mp4");

        let unc = CatalogItem::from_locator("FILE://nas\\share\\a b.mkv");
        assert_eq!(resource_url(&unc), "file://nas/share/a%20b.mkv");
    }

    #[test]
    fn test_local_item_converted() {
        let item = CatalogItem::local("/srv/videos/clip.mp4");
        assert_eq!(resource_url(&item), "file:///srv/videos/clip.mp4");
    }
}
