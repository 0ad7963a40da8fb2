use thiserror::Error;

/// Maximum size of an encoded query datagram in bytes.
pub const MAX_QUERY_SIZE: usize = 1024;

const QUERY_PREFIX: &[u8] = b"aloha:";
const QUERY_SUFFIX: u8 = b'\n';

/// Builds the query datagram for a service identifier: `aloha:<identifier>\n`.
pub fn build_query(service_identifier: &str) -> Result<Vec<u8>, QueryError> {
    if service_identifier.is_empty() {
        return Err(QueryError::Empty);
    }
    let size = QUERY_PREFIX.len() + service_identifier.len() + 1;
    if size > MAX_QUERY_SIZE {
        return Err(QueryError::TooLong(size));
    }
    let mut query = Vec::with_capacity(size);
    query.extend_from_slice(QUERY_PREFIX);
    query.extend_from_slice(service_identifier.as_bytes());
    query.push(QUERY_SUFFIX);
    Ok(query)
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Service identifier must not be empty")]
    Empty,

    #[error("Service identifier is too long, its query takes {0} bytes while the maximum is {MAX_QUERY_SIZE}")]
    TooLong(usize),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_prefixed_query() {
        let query = build_query("_easy-photo-backup._tcp").unwrap();
        assert_eq!(query, b"aloha:_easy-photo-backup._tcp\n");
    }

    #[test]
    fn empty_identifier() {
        assert_eq!(build_query("").unwrap_err(), QueryError::Empty);
    }

    #[test]
    fn identifier_at_size_limit() {
        let identifier = "x".repeat(MAX_QUERY_SIZE - QUERY_PREFIX.len() - 1);

        // When
        let query = build_query(&identifier).unwrap();

        // Then
        assert_eq!(query.len(), MAX_QUERY_SIZE);
    }

    #[test]
    fn oversized_identifier() {
        let identifier = "x".repeat(MAX_QUERY_SIZE - QUERY_PREFIX.len());

        // When
        let error = build_query(&identifier).unwrap_err();

        // Then
        assert_eq!(error, QueryError::TooLong(MAX_QUERY_SIZE + 1));
    }
}
