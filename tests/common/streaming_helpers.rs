//! Streaming Test Helpers
//!
//! Utilities for creating chunk sequences that resemble how a generation
//! response actually arrives over the wire.

use std::convert::Infallible;

use bytes::Bytes;
use futures_util::stream::{self, Stream};

/// Split input into small char-level chunks (2-3 chars each for determinism)
pub fn create_realistic_chunks(input: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let chunk_size = if i + 3 <= chars.len() && chars[i].is_ascii_alphanumeric() {
            3
        } else {
            2
        };

        let end = (i + chunk_size).min(chars.len());
        chunks.push(chars[i..end].iter().collect());
        i = end;
    }

    chunks
}

/// Break after every `=` so each sentinel arrives in many pieces
pub fn create_sentinel_splitting_chunks(input: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for ch in input.chars() {
        current.push(ch);
        if ch == '=' || current.len() >= 8 {
            chunks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Fixed-size byte chunks; may cut through multibyte characters
pub fn create_byte_chunks(input: &str, size: usize) -> Vec<Bytes> {
    input
        .as_bytes()
        .chunks(size.max(1))
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Infallible byte stream over the given text chunks
pub fn text_stream<I, T>(chunks: I) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let chunks: Vec<Result<Bytes, Infallible>> = chunks
        .into_iter()
        .map(|chunk| Ok(Bytes::from(chunk.into())))
        .collect();
    stream::iter(chunks)
}

/// Byte stream that yields `chunks` and then fails with `reason`
pub fn failing_stream(chunks: &[&str], reason: &str) -> impl Stream<Item = Result<Bytes, String>> {
    let mut items: Vec<Result<Bytes, String>> = chunks
        .iter()
        .map(|chunk| Ok(Bytes::from(chunk.to_string())))
        .collect();
    items.push(Err(reason.to_string()));
    stream::iter(items)
}

/// Byte stream that yields `chunks` and then never produces another item
pub fn stalling_stream(chunks: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> {
    use futures_util::StreamExt;

    let items: Vec<Result<Bytes, Infallible>> = chunks
        .iter()
        .map(|chunk| Ok(Bytes::from(chunk.to_string())))
        .collect();
    stream::iter(items).chain(stream::pending())
}
