//! Prelude module - common imports for opcbook users
//!
//! ```rust
//! use opcbook::prelude::*;
//! ```

pub use crate::{
    // Error types
    BookError,
    BookResult,
    CellAddress,
    CellRange,
    DefinedName,
    Error,
    NameScope,

    // Package types
    OpcError,
    Package,
    PackageAccess,
    PackageCloner,
    PartStore,
    PictureType,
    RawCell,
    RelationshipGraph,
    RelationshipOwner,
    SheetState,
    TargetMode,

    // Extension traits
    WorkbookExt,
    Worksheet,
    XlsxError,
    // Main types
    XlsxWorkbook,
};
