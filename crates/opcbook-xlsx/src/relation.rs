//! Relationship types, content types and part-name patterns used by
//! SpreadsheetML packages

use opcbook_opc::rel_types;

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Namespace of `r:` attributes such as `r:id`
pub const RELATIONSHIPS_NS: &str = REL_BASE;

/// SpreadsheetML main namespace
pub const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Known workbook-related parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XlsxRelation {
    Workbook,
    MacroWorkbook,
    TemplateWorkbook,
    MacroTemplateWorkbook,
    Worksheet,
    SharedStrings,
    Styles,
    Theme,
    Drawing,
    Hyperlink,
    OleEmbedding,
    PackageEmbedding,
    Image(PictureType),
}

impl XlsxRelation {
    /// Relationship type URI
    pub fn rel_type(&self) -> &'static str {
        match self {
            XlsxRelation::Workbook
            | XlsxRelation::MacroWorkbook
            | XlsxRelation::TemplateWorkbook
            | XlsxRelation::MacroTemplateWorkbook => rel_types::OFFICE_DOCUMENT,
            XlsxRelation::Worksheet => WORKSHEET,
            XlsxRelation::SharedStrings => SHARED_STRINGS,
            XlsxRelation::Styles => STYLES,
            XlsxRelation::Theme => THEME,
            XlsxRelation::Drawing => DRAWING,
            XlsxRelation::Hyperlink => HYPERLINK,
            XlsxRelation::OleEmbedding => OLE_OBJECT,
            XlsxRelation::PackageEmbedding => PACKAGE,
            XlsxRelation::Image(_) => IMAGE,
        }
    }

    /// Content type of the target part; hyperlinks have none
    pub fn content_type(&self) -> Option<&'static str> {
        Some(match self {
            XlsxRelation::Workbook => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"
            }
            XlsxRelation::MacroWorkbook => "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
            XlsxRelation::TemplateWorkbook => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml"
            }
            XlsxRelation::MacroTemplateWorkbook => {
                "application/vnd.ms-excel.template.macroEnabled.main+xml"
            }
            XlsxRelation::Worksheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"
            }
            XlsxRelation::SharedStrings => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"
            }
            XlsxRelation::Styles => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"
            }
            XlsxRelation::Theme => "application/vnd.openxmlformats-officedocument.theme+xml",
            XlsxRelation::Drawing => "application/vnd.openxmlformats-officedocument.drawing+xml",
            XlsxRelation::Hyperlink => return None,
            XlsxRelation::OleEmbedding => "application/vnd.openxmlformats-officedocument.oleObject",
            XlsxRelation::PackageEmbedding => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            XlsxRelation::Image(picture) => picture.content_type(),
        })
    }

    /// Part name for the `index`-th part of this kind (1-based)
    pub fn part_name(&self, index: usize) -> Option<String> {
        Some(match self {
            XlsxRelation::Workbook
            | XlsxRelation::MacroWorkbook
            | XlsxRelation::TemplateWorkbook
            | XlsxRelation::MacroTemplateWorkbook => singleton("xl/workbook", index),
            XlsxRelation::Worksheet => format!("xl/worksheets/sheet{index}.xml"),
            XlsxRelation::SharedStrings => singleton("xl/sharedStrings", index),
            XlsxRelation::Styles => singleton("xl/styles", index),
            XlsxRelation::Theme => format!("xl/theme/theme{index}.xml"),
            XlsxRelation::Drawing => format!("xl/drawings/drawing{index}.xml"),
            XlsxRelation::Hyperlink => return None,
            XlsxRelation::OleEmbedding => format!("xl/embeddings/oleObject{index}.bin"),
            XlsxRelation::PackageEmbedding => {
                format!("xl/embeddings/Microsoft_Excel_Worksheet{index}.xlsx")
            }
            XlsxRelation::Image(picture) => {
                format!("xl/media/image{index}.{}", picture.extension())
            }
        })
    }
}

/// Parts that normally exist once only get a number when the plain name is taken
fn singleton(stem: &str, index: usize) -> String {
    if index <= 1 {
        format!("{stem}.xml")
    } else {
        format!("{stem}{index}.xml")
    }
}

pub const WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
pub const STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
pub const DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
pub const HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const OLE_OBJECT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/oleObject";
pub const PACKAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/package";
pub const IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// What a relationship from the workbook part binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartRole {
    SharedStrings,
    Styles,
    Worksheet,
    Other,
}

impl PartRole {
    /// Classify by relationship type
    pub fn from_rel_type(rel_type: &str) -> Self {
        match rel_type {
            SHARED_STRINGS => PartRole::SharedStrings,
            STYLES => PartRole::Styles,
            WORKSHEET => PartRole::Worksheet,
            _ => PartRole::Other,
        }
    }
}

/// Whether a sheet relationship points at an embedded object
pub fn is_embedding(rel_type: &str) -> bool {
    rel_type == OLE_OBJECT || rel_type == PACKAGE
}

/// Image formats accepted by [`crate::XlsxWorkbook::add_picture`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    Emf,
    Wmf,
    Pict,
    Jpeg,
    Png,
    Dib,
    Gif,
    Tiff,
    Eps,
    Bmp,
    Wpg,
}

impl PictureType {
    /// File extension used for the part name
    pub fn extension(&self) -> &'static str {
        match self {
            PictureType::Emf => "emf",
            PictureType::Wmf => "wmf",
            PictureType::Pict => "pict",
            PictureType::Jpeg => "jpeg",
            PictureType::Png => "png",
            PictureType::Dib => "dib",
            PictureType::Gif => "gif",
            PictureType::Tiff => "tiff",
            PictureType::Eps => "eps",
            PictureType::Bmp => "bmp",
            PictureType::Wpg => "wpg",
        }
    }

    /// MIME content type
    pub fn content_type(&self) -> &'static str {
        match self {
            PictureType::Emf => "image/x-emf",
            PictureType::Wmf => "image/x-wmf",
            PictureType::Pict => "image/pict",
            PictureType::Jpeg => "image/jpeg",
            PictureType::Png => "image/png",
            PictureType::Dib => "image/dib",
            PictureType::Gif => "image/gif",
            PictureType::Tiff => "image/tiff",
            PictureType::Eps => "image/x-eps",
            PictureType::Bmp => "image/x-ms-bmp",
            PictureType::Wpg => "image/x-wpg",
        }
    }
}
