//! A1 address codec.
//!
//! Columns use bijective base-26: digits A–Z with no zero digit, so 1 → "A",
//! 26 → "Z", 27 → "AA". Rows are 1-based in A1 text; everything else in this
//! crate is 0-based, and the boundary between the two conventions lives here.

use crate::error::{Error, Result};

/// Convert a 1-based column number to its letter encoding.
///
/// ```
/// assert_eq!(gridhub::a1::column_to_letter(1), "A");
/// assert_eq!(gridhub::a1::column_to_letter(27), "AA");
/// assert_eq!(gridhub::a1::column_to_letter(703), "AAA");
/// ```
pub fn column_to_letter(column: u32) -> String {
    let mut letters = String::new();
    let mut n = column;
    while n > 0 {
        n -= 1;
        letters.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters
}

/// Convert a letter encoding back to its 1-based column number.
///
/// Errors on empty input or anything but ASCII letters. Case-insensitive.
pub fn letter_to_column(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidAddress(letters.to_string()));
    }
    let mut column: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidAddress(letters.to_string()));
        }
        column = column * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Ok(column)
}

/// Format 0-based (row, column) indexes as an A1 address.
pub fn to_a1(row_index: u32, column_index: u32) -> String {
    format!("{}{}", column_to_letter(column_index + 1), row_index + 1)
}

/// Parse an A1 address into 0-based (row, column) indexes.
///
/// `$` absolute markers are accepted and ignored.
pub fn parse_a1(address: &str) -> Result<(u32, u32)> {
    let s = address.trim().trim_start_matches('$');
    let letter_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let letters = &s[..letter_end];
    let digits = s[letter_end..].trim_start_matches('$');

    let column = letter_to_column(letters)
        .map_err(|_| Error::InvalidAddress(address.to_string()))?;
    let row: u32 = digits
        .parse()
        .map_err(|_| Error::InvalidAddress(address.to_string()))?;
    if row == 0 {
        return Err(Error::InvalidAddress(address.to_string()));
    }
    Ok((row - 1, column - 1))
}

/// Quote a sheet title for use in a range string. Embedded single quotes
/// are doubled, per the A1 grammar.
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Range string covering a whole sheet.
pub(crate) fn sheet_range(title: &str) -> String {
    quote_title(title)
}

/// Range string for one row span of `width` columns, e.g. `'Tab'!A5:C5`.
pub(crate) fn row_span(title: &str, row_number: u32, width: u32) -> String {
    let last = column_to_letter(width.max(1));
    format!("{}!A{row_number}:{last}{row_number}", quote_title(title))
}

/// Row-only range string, e.g. `'Tab'!5:8`.
pub(crate) fn row_only_range(title: &str, first_row: u32, last_row: u32) -> String {
    format!("{}!{first_row}:{last_row}", quote_title(title))
}

/// Split a range string into its optional sheet-title prefix and the local
/// part. Handles quoted titles, including embedded `''` escapes and `!`
/// inside quotes.
pub(crate) fn split_range(range: &str) -> Result<(Option<String>, &str)> {
    if let Some(rest) = range.strip_prefix('\'') {
        let mut title = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                title.push(c);
                continue;
            }
            if rest[i + 1..].starts_with('\'') {
                title.push('\'');
                chars.next();
                continue;
            }
            let after = &rest[i + 1..];
            return match after.strip_prefix('!') {
                Some(local) => Ok((Some(title), local)),
                None if after.is_empty() => Ok((Some(title), "")),
                None => Err(Error::InvalidRange(range.to_string())),
            };
        }
        Err(Error::InvalidRange(range.to_string()))
    } else if let Some(pos) = range.rfind('!') {
        Ok((Some(range[..pos].to_string()), &range[pos + 1..]))
    } else {
        Ok((None, range))
    }
}

/// Parse the first cell of a range string (with or without a sheet prefix)
/// into 0-based (row, column) indexes.
pub(crate) fn first_cell_of(range: &str) -> Result<(u32, u32)> {
    let (_, local) = split_range(range)?;
    let first = local.split(':').next().unwrap_or(local);
    parse_a1(first)
}
