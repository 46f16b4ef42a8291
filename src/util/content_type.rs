use std::path::Path;

/// Only this many leading bytes take part in sniffing.
const SNIFF_LEN: usize = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"OTTO", "font/otf"),
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// Content type for an object written under `key`: the extension mapping
/// wins, the body is sniffed only when the extension is missing or unknown.
pub fn detect(key: &str, body: &[u8]) -> String {
    by_extension(key).unwrap_or_else(|| sniff(body).to_string())
}

fn by_extension(key: &str) -> Option<String> {
    let ext = Path::new(key).extension()?.to_str()?;
    mime_guess::from_ext(ext).first_raw().map(str::to_string)
}

pub fn sniff(body: &[u8]) -> &'static str {
    let data = &body[..body.len().min(SNIFF_LEN)];

    let markup_start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    if let Some(content_type) = sniff_markup(&data[markup_start..]) {
        return content_type;
    }

    if let Some(&(_, content_type)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
        return content_type;
    }

    if let Some(content_type) = sniff_riff(data).or_else(|| sniff_mp4(data)) {
        return content_type;
    }

    if data.iter().any(is_binary) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }

    let is_html = HTML_TAGS.iter().any(|tag| {
        data.len() > tag.len()
            && data[..tag.len()].eq_ignore_ascii_case(tag)
            && matches!(data[tag.len()], b' ' | b'>')
    });

    is_html.then_some("text/html; charset=utf-8")
}

fn sniff_riff(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 || !data.starts_with(b"RIFF") {
        return None;
    }

    match &data[8..12] {
        b"WEBP" => Some("image/webp"),
        b"WAVE" => Some("audio/wave"),
        b"AVI " => Some("video/avi"),
        _ => None,
    }
}

fn sniff_mp4(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return None;
    }

    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size % 4 != 0 || box_size > data.len() {
        return None;
    }

    // major brand at 8, minor version at 12, compatible brands after
    (8..box_size)
        .step_by(4)
        .filter(|&offset| offset != 12 && offset + 3 <= box_size)
        .any(|offset| &data[offset..offset + 3] == b"mp4")
        .then_some("video/mp4")
}

fn is_binary(b: &u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00\x00\x0DIHDR";

    #[test]
    fn test_detect() {
        let cases: &[(&str, &[u8], &str)] = &[
            ("data.json", PNG, "application/json"),
            ("folder/data.json", b"{\"a\": 1}", "application/json"),
            ("page.html", b"plain words", "text/html"),
            ("image", PNG, "image/png"),
            ("image.unknownext", PNG, "image/png"),
            ("notes", b"hello world", TEXT_PLAIN),
            ("dir.v1/blob", b"\x00\x01\x02\x03", OCTET_STREAM),
        ];

        for &(key, body, expected) in cases {
            assert_eq!(detect(key, body), expected, "failed for case: {}", key);
        }
    }

    #[test]
    fn test_sniff() {
        let cases: &[(&[u8], &str)] = &[
            (b"", TEXT_PLAIN),
            (b"  \n<!DOCTYPE html><html></html>", "text/html; charset=utf-8"),
            (b"<p>hi</p>", "text/html; charset=utf-8"),
            (b"<pre>not a listed tag", TEXT_PLAIN),
            (b"<?xml version=\"1.0\"?><a/>", "text/xml; charset=utf-8"),
            (b"%PDF-1.7\n", "application/pdf"),
            (b"GIF89a\x01\x00", "image/gif"),
            (b"\xFF\xD8\xFF\xE0", "image/jpeg"),
            (b"PK\x03\x04\x14\x00", "application/zip"),
            (b"\x1F\x8B\x08\x00", "application/x-gzip"),
            (b"RIFF\x00\x00\x00\x00WEBPVP8 ", "image/webp"),
            (b"RIFF\x00\x00\x00\x00WAVEfmt ", "audio/wave"),
            (b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00isommp42", "video/mp4"),
            (b"\xEF\xBB\xBFhello", TEXT_PLAIN),
            (b"binary\x00data", OCTET_STREAM),
        ];

        for &(body, expected) in cases {
            assert_eq!(sniff(body), expected, "failed for case: {:?}", body);
        }
    }

    #[test]
    fn test_sniff_only_reads_prefix() {
        let mut body = vec![b'a'; SNIFF_LEN];
        body.push(0x00);

        assert_eq!(sniff(&body), TEXT_PLAIN);
    }
}
