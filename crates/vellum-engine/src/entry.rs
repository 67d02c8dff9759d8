//! Entry-point names, used in error reports and call logs.

#![allow(missing_docs)]

pub const INIT_LIBRARY: &str = "FPDF_InitLibrary";
pub const DESTROY_LIBRARY: &str = "FPDF_DestroyLibrary";
pub const GET_LAST_ERROR: &str = "FPDF_GetLastError";
pub const LOAD_MEM_DOCUMENT: &str = "FPDF_LoadMemDocument";
pub const CLOSE_DOCUMENT: &str = "FPDF_CloseDocument";
pub const GET_PAGE_COUNT: &str = "FPDF_GetPageCount";
pub const GET_META_TEXT: &str = "FPDF_GetMetaText";
pub const GET_PAGE_LABEL: &str = "FPDF_GetPageLabel";
pub const GET_FILE_VERSION: &str = "FPDF_GetFileVersion";
pub const GET_DOC_PERMISSIONS: &str = "FPDF_GetDocPermissions";

pub const INIT_FORM_FILL_ENVIRONMENT: &str = "FPDFDOC_InitFormFillEnvironment";
pub const EXIT_FORM_FILL_ENVIRONMENT: &str = "FPDFDOC_ExitFormFillEnvironment";
pub const FORM_ON_AFTER_LOAD_PAGE: &str = "FORM_OnAfterLoadPage";
pub const FORM_ON_BEFORE_CLOSE_PAGE: &str = "FORM_OnBeforeClosePage";

pub const LOAD_PAGE: &str = "FPDF_LoadPage";
pub const CLOSE_PAGE: &str = "FPDF_ClosePage";
pub const GET_PAGE_WIDTH: &str = "FPDF_GetPageWidthF";
pub const GET_PAGE_HEIGHT: &str = "FPDF_GetPageHeightF";
pub const GET_PAGE_ROTATION: &str = "FPDFPage_GetRotation";

pub const TEXT_LOAD_PAGE: &str = "FPDFText_LoadPage";
pub const TEXT_CLOSE_PAGE: &str = "FPDFText_ClosePage";
pub const TEXT_COUNT_CHARS: &str = "FPDFText_CountChars";
pub const TEXT_GET_TEXT: &str = "FPDFText_GetText";
pub const TEXT_FIND_START: &str = "FPDFText_FindStart";
pub const TEXT_FIND_NEXT: &str = "FPDFText_FindNext";
pub const TEXT_GET_SCH_RESULT_INDEX: &str = "FPDFText_GetSchResultIndex";
pub const TEXT_GET_SCH_COUNT: &str = "FPDFText_GetSchCount";
pub const TEXT_FIND_CLOSE: &str = "FPDFText_FindClose";

pub const BITMAP_CREATE_EX: &str = "FPDFBitmap_CreateEx";
pub const BITMAP_FILL_RECT: &str = "FPDFBitmap_FillRect";
pub const BITMAP_DESTROY: &str = "FPDFBitmap_Destroy";

pub const RENDER_PAGE_BITMAP: &str = "FPDF_RenderPageBitmap";
pub const RENDER_PAGE_BITMAP_START: &str = "FPDF_RenderPageBitmap_Start";
pub const RENDER_PAGE_CONTINUE: &str = "FPDF_RenderPage_Continue";
pub const RENDER_PAGE_CLOSE: &str = "FPDF_RenderPage_Close";

pub const PAGE_GET_ANNOT_COUNT: &str = "FPDFPage_GetAnnotCount";
pub const PAGE_GET_ANNOT: &str = "FPDFPage_GetAnnot";
pub const PAGE_CLOSE_ANNOT: &str = "FPDFPage_CloseAnnot";
pub const ANNOT_GET_SUBTYPE: &str = "FPDFAnnot_GetSubtype";
pub const ANNOT_GET_RECT: &str = "FPDFAnnot_GetRect";
pub const ANNOT_GET_COLOR: &str = "FPDFAnnot_GetColor";

pub const PAGE_COUNT_OBJECTS: &str = "FPDFPage_CountObjects";
pub const PAGE_GET_OBJECT: &str = "FPDFPage_GetObject";
pub const PAGE_OBJ_GET_TYPE: &str = "FPDFPageObj_GetType";
pub const PAGE_OBJ_GET_BOUNDS: &str = "FPDFPageObj_GetBounds";

pub const TEXT_OBJ_GET_FONT: &str = "FPDFTextObj_GetFont";
pub const FONT_GET_BASE_NAME: &str = "FPDFFont_GetBaseFontName";
pub const FONT_GET_WEIGHT: &str = "FPDFFont_GetWeight";
pub const FONT_GET_IS_EMBEDDED: &str = "FPDFFont_GetIsEmbedded";

pub const BOOKMARK_GET_FIRST_CHILD: &str = "FPDFBookmark_GetFirstChild";
pub const BOOKMARK_GET_NEXT_SIBLING: &str = "FPDFBookmark_GetNextSibling";
pub const BOOKMARK_GET_TITLE: &str = "FPDFBookmark_GetTitle";
pub const BOOKMARK_GET_DEST: &str = "FPDFBookmark_GetDest";
pub const DEST_GET_DEST_PAGE_INDEX: &str = "FPDFDest_GetDestPageIndex";
