#[derive(Debug)]
pub enum Error {
    /// Buffer pool has no free frame and nothing evictable (every frame pinned).
    PoolExhausted,
    /// A record's serialized form doesn't fit in an empty page.
    RecordTooLarge { size: usize, capacity: usize },
    /// Insert with a key that's already present in the index.
    DuplicateKey(u32),
    /// Lookup for a key that isn't present.
    NotFound(u32),
    /// Unpin called on a page that has a zero pin count, or on a page id
    /// not currently resident in the pool.
    DoubleUnpin(u32),
    /// A page id was referenced that the pool has no record of.
    UnknownPage(u32),
    /// Disk I/O failure underneath the paged file.
    Io(std::io::Error),
    /// Bytes read back from disk don't satisfy a page's own invariants.
    CorruptPage(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PoolExhausted => write!(f, "buffer pool exhausted: no evictable frame"),
            Error::RecordTooLarge { size, capacity } => {
                write!(f, "record of {size} bytes exceeds page capacity of {capacity} bytes")
            }
            Error::DuplicateKey(key) => write!(f, "key {key} already exists"),
            Error::NotFound(key) => write!(f, "key {key} not found"),
            Error::DoubleUnpin(page_id) => write!(f, "page {page_id} unpinned past zero"),
            Error::UnknownPage(page_id) => write!(f, "page {page_id} is not resident in the pool"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::CorruptPage(context) => write!(f, "corrupt page: {context}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
