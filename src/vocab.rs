//! Static vocabularies shared with the document backend: response signals
//! and vector-store settings. Nothing in the question/answer path uses them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| Error::NotFound {
                        kind: stringify!($name),
                        name: s.to_string(),
                    })
            }
        }
    };
}

string_enum! {
    /// Outcome codes reported for file validation, upload and processing.
    ///
    /// The wire values are fixed, misspellings included.
    pub enum ResponseSignal {
        FileValidatedSuccess => "file_validated_successfully",
        FileTypeNotSupported => "file_type_not_supported",
        FileSizeExceeded => "file_size_exceeded",
        FileUploadSuccess => "file_upload_success",
        FileUploadFailed => "file_upload_falied",
        ProcessingSuccess => "processing success",
        ProcessingFailed => "processing failed",
        NoFilesError => "not_found_files",
        FileIdError => "no_file_found_with_this_id",
    }
}

string_enum! {
    pub enum VectorDbBackend {
        Qdrant => "QDRANT",
    }
}

string_enum! {
    /// Similarity metric for vector search.
    pub enum DistanceMethod {
        Cosine => "cosine",
        Dot => "dot",
    }
}
