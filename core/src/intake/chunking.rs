// comanda/src/intake/chunking.rs

//! The item-list metadata codec.
//!
//! Processor metadata values are capped at 500 characters. A serialized item list
//! that fits goes under `orderItems`; otherwise it is cut into 490-character
//! pieces stored as `orderItems_0 .. orderItems_{N-1}` with `orderItemsChunks = N`.

use std::collections::HashMap;

use crate::error::{OrderError, OrderResult};
use crate::model::LineItem;

pub const METADATA_VALUE_LIMIT: usize = 500;
pub const CHUNK_SIZE: usize = 490;

pub const SINGLE_KEY: &str = "orderItems";
pub const CHUNK_COUNT_KEY: &str = "orderItemsChunks";
pub const CHUNK_KEY_PREFIX: &str = "orderItems_";

pub const CUSTOMER_NAME_KEY: &str = "customerName";
pub const CUSTOMER_PHONE_KEY: &str = "customerPhone";
pub const GUEST_ID_KEY: &str = "guestId";
pub const USER_ID_KEY: &str = "userId";

pub fn chunk_key(index: usize) -> String {
  format!("{}{}", CHUNK_KEY_PREFIX, index)
}

/// Splits `json` into pieces of at most `chunk_size` characters, never inside a code point.
pub fn encode_chunked(json: &str, chunk_size: usize) -> Vec<String> {
  let chunk_size = chunk_size.max(1);
  let chars: Vec<char> = json.chars().collect();
  chars.chunks(chunk_size).map(|c| c.iter().collect()).collect()
}

pub fn decode_chunked<S: AsRef<str>>(chunks: &[S]) -> String {
  chunks.iter().map(AsRef::as_ref).collect()
}

/// Metadata entries carrying `items`.
pub fn encode_items(items: &[LineItem]) -> OrderResult<Vec<(String, String)>> {
  let json = serde_json::to_string(items)
    .map_err(|e| OrderError::Validation(format!("items could not be serialized: {}", e)))?;

  if json.chars().count() <= METADATA_VALUE_LIMIT {
    return Ok(vec![(SINGLE_KEY.to_string(), json)]);
  }

  let chunks = encode_chunked(&json, CHUNK_SIZE);
  let count = chunks.len();
  let mut entries: Vec<(String, String)> = chunks
    .into_iter()
    .enumerate()
    .map(|(i, chunk)| (chunk_key(i), chunk))
    .collect();
  entries.push((CHUNK_COUNT_KEY.to_string(), count.to_string()));
  Ok(entries)
}

/// Reassembles the item list from webhook metadata.
///
/// Neither key present yields an empty list. A bad chunk count, a missing chunk
/// or unparsable JSON is a `MalformedPayload`.
pub fn decode_items(metadata: &HashMap<String, String>) -> OrderResult<Vec<LineItem>> {
  let json = if let Some(raw_count) = metadata.get(CHUNK_COUNT_KEY) {
    let count: usize = raw_count
      .trim()
      .parse()
      .ok()
      .filter(|n| *n > 0)
      .ok_or_else(|| OrderError::MalformedPayload(format!("invalid {} value '{}'", CHUNK_COUNT_KEY, raw_count)))?;
    let mut parts = Vec::with_capacity(count);
    for i in 0..count {
      let key = chunk_key(i);
      let part = metadata
        .get(&key)
        .ok_or_else(|| OrderError::MalformedPayload(format!("missing item chunk '{}' of {}", key, count)))?;
      parts.push(part.as_str());
    }
    decode_chunked(&parts)
  } else if let Some(single) = metadata.get(SINGLE_KEY) {
    single.clone()
  } else {
    return Ok(Vec::new());
  };

  serde_json::from_str(&json).map_err(|e| OrderError::MalformedPayload(format!("item list is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal::Decimal;

  #[test]
  fn chunking_respects_char_boundaries() {
    let s = "ñ".repeat(7);
    let chunks = encode_chunked(&s, 3);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2], "ñ");
    assert_eq!(decode_chunked(&chunks), s);
  }

  #[test]
  fn twelve_hundred_chars_make_three_chunks() {
    let s = "x".repeat(1200);
    let chunks = encode_chunked(&s, CHUNK_SIZE);
    assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![490, 490, 220]);
  }

  #[test]
  fn small_lists_use_the_single_key() {
    let items = vec![LineItem::new("Taco", 2, Decimal::new(400, 2))];
    let entries = encode_items(&items).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, SINGLE_KEY);
    assert!(entries[0].1.contains("\"qty\":2"));
  }

  #[test]
  fn missing_chunk_is_malformed() {
    let mut md = HashMap::new();
    md.insert(CHUNK_COUNT_KEY.to_string(), "3".to_string());
    md.insert(chunk_key(0), "[".to_string());
    md.insert(chunk_key(2), "]".to_string());
    assert!(matches!(decode_items(&md), Err(OrderError::MalformedPayload(_))));

    md.insert(CHUNK_COUNT_KEY.to_string(), "zero".to_string());
    assert!(matches!(decode_items(&md), Err(OrderError::MalformedPayload(_))));
  }

  #[test]
  fn absent_keys_mean_no_items() {
    assert!(decode_items(&HashMap::new()).unwrap().is_empty());
  }
}
