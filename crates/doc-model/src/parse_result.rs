use crate::{Document, ModelError, Page, PageId, Run};
use serde::{Deserialize, Serialize};

/// Output of the text-extraction step: one `Page` block per page, each carrying its lines
/// of positioned runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub blocks: ParseBlocks,
    #[serde(default)]
    pub metadata: ParseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseBlocks {
    #[serde(default = "document_block_type")]
    pub block_type: String,
    pub children: Vec<ParseBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseBlock {
    pub id: String,
    pub block_type: String,
    pub text: String,
    pub page: u32,
    #[serde(rename = "textItems")]
    pub text_items: Vec<Vec<Run>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMetadata {
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub file_name: String,
}

fn document_block_type() -> String {
    "Document".to_owned()
}

impl Document {
    pub fn from_parse_result(result: ParseResult) -> Result<Self, ModelError> {
        let mut blocks = result.blocks.children;

        for block in &blocks {
            if block.block_type != "Page" {
                return Err(ModelError::UnsupportedBlock {
                    id: block.id.clone(),
                    block_type: block.block_type.clone(),
                });
            }

            if block.page == 0 {
                return Err(ModelError::InvalidPageNumber {
                    id: block.id.clone(),
                    page: block.page,
                });
            }
        }

        blocks.sort_by_key(|block| block.page);

        let pages = blocks
            .into_iter()
            .map(|block| Page::new(PageId(block.id), block.page - 1, block.text, block.text_items))
            .collect();

        Document::try_new(pages)
    }
}
