//! Turns a raw request target into a structured, absolute URI.
//!
//! Absolute-form targets are used as they are. Origin-form targets are resolved against the
//! `Host` header, then against the local address of the connection, using the `http` scheme.
//! The target is checked strictly: percent escapes must be complete and characters outside of
//! RFC 3986 are rejected, even when the connection's parser let them through.

use crate::error::MalformedRequestTarget;
use http::uri::{Authority, Scheme};
use http::{Uri, header};
use micro_transport::RawRequest;

pub(crate) fn resolve_request_uri(request: &RawRequest) -> Result<Uri, MalformedRequestTarget> {
    let target = request.uri();

    let path_and_query = target
        .path_and_query()
        .ok_or_else(|| MalformedRequestTarget::new(target, "missing path"))?;
    check_target(path_and_query.as_str()).map_err(|reason| MalformedRequestTarget::new(target, reason))?;

    let scheme = target.scheme().cloned().unwrap_or(Scheme::HTTP);
    let authority = match target.authority() {
        Some(authority) => authority.clone(),
        None => resolve_authority(request).map_err(|reason| MalformedRequestTarget::new(target, reason))?,
    };

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query.clone())
        .build()
        .map_err(|e| MalformedRequestTarget::new(target, e))
}

fn resolve_authority(request: &RawRequest) -> Result<Authority, &'static str> {
    if let Some(host) = request.headers().get(header::HOST) {
        let host = host.to_str().map_err(|_not_ascii| "invalid host header")?;
        if host.contains(['@', '/', ' ']) {
            return Err("invalid host header");
        }
        return host.parse::<Authority>().map_err(|_invalid| "invalid host header");
    }

    match request.local_addr() {
        Some(addr) => addr.to_string().parse::<Authority>().map_err(|_invalid| "invalid local address"),
        None => Ok(Authority::from_static("localhost")),
    }
}

fn check_target(target: &str) -> Result<(), &'static str> {
    let bytes = target.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escaped = bytes.get(i + 1..i + 3).is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
                if !escaped {
                    return Err("invalid percent-encoding");
                }
                i += 3;
                continue;
            }
            b'"' | b'<' | b'>' | b'\\' | b'^' | b'`' | b'{' | b'|' | b'}' | b'[' | b']' | b'#' => {
                return Err("illegal character");
            }
            b if !b.is_ascii_graphic() => return Err("illegal character"),
            _ => {}
        }
        i += 1;
    }
    Ok(())
}
