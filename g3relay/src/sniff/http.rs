/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use memchr::memmem;

use super::SignatureResult;

const METHODS: &[&[u8]] = &[
    b"GET ",
    b"POST ",
    b"PUT ",
    b"HEAD ",
    b"DELETE ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"TRACE ",
];

fn check_method(data: &[u8]) -> SignatureResult {
    let mut need_more = false;
    for method in METHODS {
        if data.starts_with(method) {
            return SignatureResult::Match;
        }
        if data.len() < method.len() && method.starts_with(data) {
            need_more = true;
        }
    }
    if need_more {
        SignatureResult::NeedMoreData
    } else {
        SignatureResult::NoMatch
    }
}

fn is_host_line(line: &[u8]) -> bool {
    const HOST: &[u8] = b"host:";
    line.len() > HOST.len() && line[..HOST.len()].eq_ignore_ascii_case(HOST)
}

/// An HTTP/1 request with a Host header in its request head.
pub(super) fn check_host(data: &[u8]) -> SignatureResult {
    match check_method(data) {
        SignatureResult::Match => {}
        r => return r,
    }

    let head_end = memmem::find(data, b"\r\n\r\n");
    let head = match head_end {
        Some(p) => &data[..p + 2],
        None => data,
    };

    // skip the request line
    let Some(line_end) = memmem::find(head, b"\r\n") else {
        return SignatureResult::NeedMoreData;
    };
    let mut left = &head[line_end + 2..];
    while let Some(p) = memmem::find(left, b"\r\n") {
        if is_host_line(&left[..p]) {
            return SignatureResult::Match;
        }
        left = &left[p + 2..];
    }

    if head_end.is_some() {
        SignatureResult::NoMatch
    } else {
        SignatureResult::NeedMoreData
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method() {
        assert_eq!(check_host(b""), SignatureResult::NeedMoreData);
        assert_eq!(check_host(b"PO"), SignatureResult::NeedMoreData);
        assert_eq!(check_host(b"FOO / HTTP/1.1\r\n"), SignatureResult::NoMatch);
        assert_eq!(check_host(b"GETX"), SignatureResult::NoMatch);
    }

    #[test]
    fn host() {
        assert_eq!(
            check_host(b"GET / HTTP/1.1\r\nHost: a.net\r\n\r\n"),
            SignatureResult::Match
        );
        assert_eq!(
            check_host(b"GET / HTTP/1.1\r\nAccept: */*\r\nhost: a.net\r\n"),
            SignatureResult::Match
        );
        assert_eq!(
            check_host(b"GET / HTTP/1.1\r\nAccept: */*\r\n"),
            SignatureResult::NeedMoreData
        );
        assert_eq!(
            check_host(b"GET / HTTP/1.0\r\nAccept: */*\r\n\r\n"),
            SignatureResult::NoMatch
        );
    }
}
