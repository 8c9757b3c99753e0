// Central place for labels, document keys and other non-localized constants.
// Keep these out of the command/session code to reduce duplication.

// English labels (EN_ prefix to make future localization easier)
pub const EN_APP_NAME: &str = "xdat-editor";

pub const EN_ACTION_CREATE: &str = "Create";
pub const EN_ACTION_PASTE: &str = "Paste";
pub const EN_ACTION_DUPLICATE: &str = "Duplicate";
pub const EN_ACTION_IMPORT: &str = "Import";
pub const EN_ACTION_DELETE: &str = "Delete";
pub const EN_ACTION_MOVE: &str = "Move";
pub const EN_MOVE_OTHER_LIST: &str = "to different list";

// Property-change descriptions shorten long values.
pub const EN_ELLIPSIS: &str = "...";
pub const DESCRIPTION_VALUE_MAX_CHARS: usize = 30;
pub const DESCRIPTION_VALUE_KEEP_CHARS: usize = 27;

pub const EN_LITERAL_NULL: &str = "null";
pub const EN_LITERAL_BLOB: &str = "<blob>";
pub const EN_MIRROR_MATCHES: &str = "matches:";
pub const EN_PLACEHOLDER_UNSAVED: &str = "<unsaved>";

// UI descriptor document structure (XD_ prefix)
pub const XD_VARIANT_ROOT: &str = "XDAT";
pub const XD_LIST_WINDOWS: &str = "windows";
pub const XD_LIST_FONTS: &str = "fonts";
pub const XD_PROP_NAME: &str = "name";

// Script-style path rendering: xdat.windows["Main"].children[2]
pub const XD_PATH_ROOT: &str = "xdat";

// Attributes searched by free-text search/replace when no property filter is set.
pub const XD_COMMON_TEXT_PROPERTIES: [&str; 9] = [
    "name",
    "text",
    "buttonNameText",
    "titleText",
    "file",
    "normalTex",
    "backTex",
    "fontName",
    "styleName",
];

// Undo history
pub const DEFAULT_MAX_HISTORY: usize = 100;

// Recent files
pub const DEFAULT_MAX_RECENT_FILES: usize = 10;

// Binary document container ("XDOC", little-endian)
pub const DOC_MAGIC: [u8; 4] = *b"XDOC";
pub const DOC_FORMAT_VERSION: u32 = 1;

// Window export files (magic and version as little-endian u32)
pub const WINDOW_MAGIC: u32 = 0x5857_494E;
pub const WINDOW_FORMAT_VERSION: u32 = 1;
pub const WINDOW_FILE_EXTENSION: &str = "xdatwin";

// Decoder limits.
pub const CODEC_MAX_DEPTH: usize = 256;
pub const CODEC_MAX_LEN: u32 = 64 * 1024 * 1024;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const GZ_EXTENSION: &str = "gz";

// Settings file keys (camelCase on disk).
pub const SETTINGS_MAX_HISTORY: &str = "maxHistory";
pub const SETTINGS_MAX_RECENT_FILES: &str = "maxRecentFiles";
pub const SETTINGS_RECENT_FILES: &str = "recentFiles";
pub const SETTINGS_PATH: &str = "path";
pub const SETTINGS_OPENED_AT: &str = "openedAt";
