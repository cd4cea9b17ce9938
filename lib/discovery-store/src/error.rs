use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("node does not exist: {0}")]
    NoNode(String),

    #[error("node already exists: {0}")]
    NodeExists(String),

    #[error("node has children: {0}")]
    NotEmpty(String),

    #[error("ephemeral nodes cannot have children: {0}")]
    NoChildrenForEphemerals(String),

    #[error("version conflict on {0}")]
    BadVersion(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("error looking up {path:?}: {source}")]
    Lookup {
        path: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("error creating {path:?}: {source}")]
    Create {
        path: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("error removing {path:?}: {source}")]
    Remove {
        path: String,
        #[source]
        source: Box<StoreError>,
    },
}
