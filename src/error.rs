/// Error during deserialization
#[derive(Debug)]
pub enum DecodeError {
    /// A length prefix or fixed-size field needs more bytes than remain
    UnexpectedEof {
        /// Field being decoded
        what: &'static str,
        /// Bytes required by the field
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedEof {
                what,
                needed,
                available,
            } => write!(
                f,
                "DecodeError(UnexpectedEof: {what} needs {needed} bytes, {available} available)"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Error during serialization
#[derive(Debug)]
pub enum EncodeError {
    /// A length does not fit into its 32-bit wire field
    LengthOverflow {
        /// Field being encoded
        what: &'static str,
        /// Offending length
        len: usize,
    },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthOverflow { what, len } => {
                write!(f, "EncodeError(LengthOverflow: {what} length {len} exceeds u32)")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Error during table construction
#[derive(Debug)]
pub enum BuildError {
    /// The same key was added more than once
    DuplicateKey(Vec<u8>),

    /// No displacement seed placed the bucket within the attempt bound
    BucketPlacement {
        /// Primary-hash bucket that could not be placed
        bucket: usize,
        /// Number of keys in that bucket
        bucket_size: usize,
        /// Fresh seeds tried for it
        attempts: u64,
    },

    /// Two keys in one bucket land on the same slot under every displacement
    UnseparableBucket {
        /// Primary-hash bucket holding the pair
        bucket: usize,
        /// Number of keys in that bucket
        bucket_size: usize,
    },

    /// Two distinct keys have the same 64-bit hash
    HashCollision {
        /// Key added first
        first: Vec<u8>,
        /// Key added later
        second: Vec<u8>,
    },

    /// Every selector value below the sentinel is already in use
    TooManyHashFunctions,

    /// Key and value arrays differ in length
    LengthMismatch {
        /// Number of keys
        keys: usize,
        /// Number of values
        values: usize,
    },

    /// More keys than the 32-bit wire format can describe
    TooManyKeys(usize),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(key) => {
                write!(f, "BuildError(DuplicateKey: {:?})", String::from_utf8_lossy(key))
            }
            Self::BucketPlacement {
                bucket,
                bucket_size,
                attempts,
            } => write!(
                f,
                "BuildError(BucketPlacement: no collision-free hash function for bucket {bucket} \
                 with {bucket_size} keys after {attempts} attempts)"
            ),
            Self::UnseparableBucket {
                bucket,
                bucket_size,
            } => write!(
                f,
                "BuildError(UnseparableBucket: bucket {bucket} with {bucket_size} keys has a pair \
                 no displacement can separate)"
            ),
            Self::HashCollision { first, second } => write!(
                f,
                "BuildError(HashCollision: {:?} and {:?})",
                String::from_utf8_lossy(first),
                String::from_utf8_lossy(second)
            ),
            Self::TooManyHashFunctions => write!(f, "BuildError(TooManyHashFunctions)"),
            Self::LengthMismatch { keys, values } => {
                write!(f, "BuildError(LengthMismatch: {keys} keys, {values} values)")
            }
            Self::TooManyKeys(n) => write!(f, "BuildError(TooManyKeys: {n})"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Represents errors that can occur while building, writing or reading a CHD table
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Deserialization failed
    Decode(DecodeError),

    /// Serialization failed
    Encode(EncodeError),

    /// Construction failed
    Build(BuildError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "ChdError(Io: {e})"),
            Self::Decode(e) => write!(f, "ChdError({e})"),
            Self::Encode(e) => write!(f, "ChdError({e})"),
            Self::Build(e) => write!(f, "ChdError({e})"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Build(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<BuildError> for Error {
    fn from(value: BuildError) -> Self {
        Self::Build(value)
    }
}

/// CHD result
pub type Result<T> = std::result::Result<T, Error>;
