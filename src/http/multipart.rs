//! Minimal `multipart/form-data` reader for the upload endpoint

/// One form field; files carry their client side name
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// Boundary parameter of a `multipart/form-data` content type
pub fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';').map(str::trim);
    if !params.next()?.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|param| {
            let mut kv = param.splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some(key), Some(value)) if key.trim().eq_ignore_ascii_case("boundary") => {
                    Some(value.trim().trim_matches('"').to_string())
                }
                _ => None,
            }
        })
        .find(|boundary| !boundary.is_empty())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

/// Quoted `key="value"` parameter of a Content-Disposition line
fn disposition_param(line: &str, key: &str) -> Option<String> {
    line.split(';').map(str::trim).find_map(|param| {
        let mut kv = param.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some(k), Some(v)) if k.trim().eq_ignore_ascii_case(key) => Some(v.trim().trim_matches('"').to_string()),
            _ => None,
        }
    })
}

fn parse_part(raw: &[u8]) -> Option<Part> {
    let header_end = find(raw, b"\r\n\r\n", 0)?;
    let head = String::from_utf8_lossy(&raw[..header_end]);
    let disposition = head
        .split("\r\n")
        .find(|line| line.to_lowercase().starts_with("content-disposition:"))?;
    Some(Part {
        name: disposition_param(disposition, "name")?,
        filename: disposition_param(disposition, "filename"),
        data: raw[header_end + 4..].to_vec(),
    })
}

/// Parts of `body`; malformed parts are skipped
pub fn parse(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut parts = vec![];
    let mut cursor = match find(body, &delimiter, 0) {
        Some(start) => start + delimiter.len(),
        None => return parts,
    };
    loop {
        if body[cursor..].starts_with(b"--") {
            break;
        }
        let start = if body[cursor..].starts_with(b"\r\n") { cursor + 2 } else { cursor };
        let next = match find(body, &delimiter, start) {
            Some(next) => next,
            None => break,
        };
        let end = if next >= 2 && &body[next - 2..next] == b"\r\n" { next - 2 } else { next };
        if let Some(part) = parse_part(&body[start..end.max(start)]) {
            parts.push(part);
        }
        cursor = next + delimiter.len();
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_comes_from_the_content_type() {
        assert_eq!(boundary("multipart/form-data; boundary=XyZ"), Some("XyZ".to_string()));
        assert_eq!(boundary("multipart/form-data; boundary=\"q q\""), Some("q q".to_string()));
        assert_eq!(boundary("application/json"), None);
    }

    #[test]
    fn fields_and_files_are_split() {
        let body = b"--B\r\n\
Content-Disposition: form-data; name=\"tenant_slug\"\r\n\r\n\
local1\r\n\
--B\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"foto.png\"\r\n\
Content-Type: image/png\r\n\r\n\
\x89PNG\r\n\x00\x01\r\n\
--B--\r\n";
        let parts = parse(body, "B");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "tenant_slug");
        assert_eq!(parts[0].data, b"local1".to_vec());
        assert_eq!(parts[1].filename, Some("foto.png".to_string()));
        assert_eq!(parts[1].data, b"\x89PNG\r\n\x00\x01".to_vec());
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(parse(b"no boundary here", "B").is_empty());
    }
}
