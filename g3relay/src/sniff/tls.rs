/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use super::SignatureResult;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;

/// record header: content type(1) + version(2) + length(2), then the handshake type
pub(super) fn check_client_hello(data: &[u8]) -> SignatureResult {
    let Some(content_type) = data.first() else {
        return SignatureResult::NeedMoreData;
    };
    if *content_type != CONTENT_TYPE_HANDSHAKE {
        return SignatureResult::NoMatch;
    }

    let Some(major) = data.get(1) else {
        return SignatureResult::NeedMoreData;
    };
    if *major != 0x03 {
        return SignatureResult::NoMatch;
    }

    match data.get(5) {
        Some(&HANDSHAKE_TYPE_CLIENT_HELLO) => SignatureResult::Match,
        Some(_) => SignatureResult::NoMatch,
        None => SignatureResult::NeedMoreData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello() {
        assert_eq!(check_client_hello(&[]), SignatureResult::NeedMoreData);
        assert_eq!(check_client_hello(&[0x16]), SignatureResult::NeedMoreData);
        assert_eq!(check_client_hello(&[0x17]), SignatureResult::NoMatch);
        assert_eq!(check_client_hello(&[0x16, 0x02]), SignatureResult::NoMatch);
        assert_eq!(
            check_client_hello(&[0x16, 0x03, 0x01, 0x00]),
            SignatureResult::NeedMoreData
        );
        assert_eq!(
            check_client_hello(&[0x16, 0x03, 0x01, 0x00, 0x10, 0x01]),
            SignatureResult::Match
        );
        assert_eq!(
            check_client_hello(&[0x16, 0x03, 0x03, 0x00, 0x10, 0x02]),
            SignatureResult::NoMatch
        );
    }
}
