//! Link codec: the URL `#fragment` that carries key material out-of-band.
//!
//! Fragment shape: `key=<b64>` always; `pp=1&pps=<b64>` iff a passphrase was
//! set; `hint=<urlencoded>` iff a hint was supplied. Browsers never transmit
//! the fragment, so the server never sees any of these fields.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::keys::KeyMaterial;
use crate::{Error, KEY_LEN, PASSPHRASE_SALT_LEN};

/// Encode key material into a fragment string (without the leading `#`).
pub fn encode_fragment(material: &KeyMaterial) -> String {
    let mut fragment = format!("key={}", URL_SAFE_NO_PAD.encode(material.random_key));
    if material.requires_passphrase {
        if let Some(salt) = &material.passphrase_salt {
            fragment.push_str("&pp=1&pps=");
            fragment.push_str(&URL_SAFE_NO_PAD.encode(salt));
        }
    }
    if let Some(hint) = material.hint.as_deref().filter(|h| !h.is_empty()) {
        fragment.push_str("&hint=");
        fragment.push_str(&percent_encode(hint));
    }
    fragment
}

/// Decode a fragment string (leading `#` tolerated) back into key material.
///
/// Fails with `MalformedKeyFragment` if the `key` field is absent or
/// undecodable, or if `pp=1` is set without a decodable `pps` salt.
pub fn decode_fragment(fragment: &str) -> Result<KeyMaterial, Error> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);

    let mut key_b64 = None;
    let mut pps_b64 = None;
    let mut requires_passphrase = false;
    let mut hint = None;

    for pair in fragment.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        match name {
            "key" => key_b64 = Some(value),
            "pps" => pps_b64 = Some(value),
            "pp" => requires_passphrase = value == "1",
            "hint" => hint = Some(percent_decode(value)?),
            _ => {} // unknown fields are ignored for forward compatibility
        }
    }

    let random_key: [u8; KEY_LEN] = decode_b64(key_b64.ok_or(Error::MalformedKeyFragment)?)?
        .try_into()
        .map_err(|_| Error::MalformedKeyFragment)?;

    let passphrase_salt = match (requires_passphrase, pps_b64) {
        (true, None) => return Err(Error::MalformedKeyFragment),
        (_, None) => None,
        (_, Some(b64)) => {
            let salt: [u8; PASSPHRASE_SALT_LEN] = decode_b64(b64)?
                .try_into()
                .map_err(|_| Error::MalformedKeyFragment)?;
            Some(salt)
        }
    };

    Ok(KeyMaterial {
        random_key,
        passphrase_salt,
        requires_passphrase,
        hint: hint.filter(|h: &String| !h.is_empty()),
    })
}

/// Accept both url-safe and standard alphabets: links minted by the web
/// client carry standard base64, percent-escaped by URLSearchParams.
fn decode_b64(value: &str) -> Result<Vec<u8>, Error> {
    let unescaped = percent_decode(value)?;
    URL_SAFE_NO_PAD
        .decode(unescaped.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(&unescaped))
        .map_err(|_| Error::MalformedKeyFragment)
}

// Minimal percent codec for the hint field; the rest of the fragment is
// base64 and needs none.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode(input: &str) -> Result<String, Error> {
    let mut out = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3).ok_or(Error::MalformedKeyFragment)?;
                let hex = std::str::from_utf8(hex).map_err(|_| Error::MalformedKeyFragment)?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| Error::MalformedKeyFragment)?;
                out.push(byte);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| Error::MalformedKeyFragment)
}
