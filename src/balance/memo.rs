//! Memo routing
//!
//! Funds sent to the shared deposit address are attributed to a virtual
//! sub-account named by the transaction memo: `{base}${memo}`.

use crate::xdr::envelope::MAX_MEMO_TEXT;
use crate::xdr::{self, Memo};

pub const SEPARATOR: char = '$';

pub fn virtual_address(base: &str, memo: &str) -> String {
    format!("{}{}{}", base, SEPARATOR, memo.trim())
}

/// Account ids compare ASCII case-insensitively
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Split `G...$memo` into base and extension. A plain address has no extension.
pub fn parse_virtual_address(address: &str) -> (&str, Option<&str>) {
    match address.split_once(SEPARATOR) {
        Some((base, extension)) => (base, Some(extension)),
        None => (address, None),
    }
}

/// A memo that may name a sub-account
pub fn is_usable_memo_text(text: &str) -> bool {
    !text.is_empty()
        && text.len() <= MAX_MEMO_TEXT
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Routing key carried by a transaction memo, if any
pub fn usable_memo(memo: &Memo) -> Option<String> {
    let text = xdr::memo_text(memo)?.trim().to_string();
    is_usable_memo_text(&text).then_some(text)
}

/// `G...` account id, optionally followed by `$memo`
pub fn is_valid_address(address: &str) -> bool {
    let (base, extension) = parse_virtual_address(address);
    xdr::is_valid_account_id(base) && extension.is_none_or(is_usable_memo_text)
}
