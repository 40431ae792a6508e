//! MediaWiki XML dump reading: `.xml` or `.xml.bz2`, one `<page>` at a time.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use bzip2::read::BzDecoder;
use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref TITLE_PATTERN: Regex = Regex::new(r"<title>([^<]+)</title>").unwrap();
    static ref NS_PATTERN: Regex = Regex::new(r"<ns>(\d+)</ns>").unwrap();
    static ref TEXT_PATTERN: Regex = Regex::new(r"(?s)<text[^>]*>(.+?)</text>").unwrap();
    static ref REDIRECT_PATTERN: Regex = Regex::new(r#"<redirect\s+title="[^"]+""#).unwrap();
}

/// A main-namespace page lifted out of the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Position in the dump, used to restore order after parallel work.
    pub page_id: usize,
    /// NFC-normalized headword.
    pub title: String,
    pub text: String,
    pub redirect: bool,
}

/// Open a dump, decompressing on the fly when the name ends in `.bz2`.
pub fn open(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    Ok(if path.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(256 * 1024, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    })
}

/// Feed every complete `<page>…</page>` block to `callback` until it returns
/// false or the input ends.
pub fn scan_pages(mut reader: impl BufRead, mut callback: impl FnMut(String) -> bool) -> io::Result<()> {
    let mut buffer = String::new();
    let mut chunk = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = reader.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }

        buffer.push_str(&String::from_utf8_lossy(&chunk[..bytes_read]));

        while let Some(start) = buffer.find("<page>") {
            if let Some(end_offset) = buffer[start..].find("</page>") {
                let end = start + end_offset + "</page>".len();
                let page_xml = buffer[start..end].to_string();
                buffer.drain(..end);

                if !callback(page_xml) {
                    return Ok(());
                }
            } else {
                buffer.drain(..start);
                break;
            }
        }

        // Keep a short tail in case `<page>` straddles two chunks.
        if buffer.len() > 10 && !buffer.contains("<page>") {
            let mut cut = buffer.len() - 10;
            while !buffer.is_char_boundary(cut) {
                cut -= 1;
            }
            buffer.drain(..cut);
        }
    }

    Ok(())
}

/// Title and text of a namespace-0 page; `None` for other namespaces or
/// pages missing either field.
pub fn extract_page(page_xml: &str, page_id: usize) -> Option<RawPage> {
    let title = TITLE_PATTERN.captures(page_xml).map(|cap| unescape(&cap[1]))?;

    if let Some(cap) = NS_PATTERN.captures(page_xml) {
        if &cap[1] != "0" {
            return None;
        }
    }

    let text = TEXT_PATTERN.captures(page_xml).map(|cap| unescape(&cap[1]))?;

    Some(RawPage {
        page_id,
        title: title.nfc().collect(),
        text,
        redirect: REDIRECT_PATTERN.is_match(page_xml),
    })
}

/// Undo the XML escaping of the dump.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn page(title: &str, ns: u32, body: &str) -> String {
        format!(
            "<page>\n<title>{title}</title>\n<ns>{ns}</ns>\n<revision><text bytes=\"1\" xml:space=\"preserve\">{body}</text></revision>\n</page>"
        )
    }

    #[test]
    fn scans_every_page() {
        let dump = format!(
            "<mediawiki>{}{}{}</mediawiki>",
            page("a", 0, "x"),
            page("b", 0, "y"),
            page("c", 0, "z")
        );
        let mut seen = Vec::new();
        scan_pages(Cursor::new(dump), |xml| {
            seen.push(extract_page(&xml, seen.len()).map(|p| p.title));
            true
        })
        .unwrap();
        assert_eq!(seen, vec![Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]);
    }

    #[test]
    fn callback_can_stop_the_scan() {
        let dump = format!("{}{}", page("a", 0, "x"), page("b", 0, "y"));
        let mut count = 0;
        scan_pages(Cursor::new(dump), |_| {
            count += 1;
            false
        })
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn extracts_and_unescapes() {
        let xml = page("chat", 0, "== {{langue|fr}} ==\n&lt;!-- note --&gt; l&amp;#039;a &quot;b&quot;");
        let raw = extract_page(&xml, 7).unwrap();
        assert_eq!(raw.page_id, 7);
        assert_eq!(raw.title, "chat");
        assert_eq!(raw.text, "== {{langue|fr}} ==\n<!-- note --> l&#039;a \"b\"");
        assert!(!raw.redirect);
    }

    #[test]
    fn other_namespaces_are_skipped() {
        assert_eq!(extract_page(&page("Modèle:pron", 10, "x"), 0), None);
    }

    #[test]
    fn redirects_are_flagged() {
        let xml = "<page><title>chats</title><ns>0</ns><redirect title=\"chat\" /><text>#REDIRECT [[chat]]</text></page>";
        assert!(extract_page(xml, 0).unwrap().redirect);
    }

    #[test]
    fn titles_are_nfc() {
        let raw = extract_page(&page("e\u{301}te\u{301}", 0, "x"), 0).unwrap();
        assert_eq!(raw.title, "été");
    }

    #[test]
    fn plain_and_compressed_dumps_open() {
        use bzip2::write::BzEncoder;
        use bzip2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("dump.xml");
        let packed = dir.path().join("dump.xml.bz2");
        let content = page("a", 0, "x");
        std::fs::write(&plain, &content).unwrap();
        let mut encoder = BzEncoder::new(File::create(&packed).unwrap(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();

        for path in [&plain, &packed] {
            let mut titles = Vec::new();
            scan_pages(open(path).unwrap(), |xml| {
                titles.extend(extract_page(&xml, 0).map(|p| p.title));
                true
            })
            .unwrap();
            assert_eq!(titles, vec!["a".to_string()]);
        }
    }
}
