//! Block files read by `blockpreview render`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use blockpreview_blocks::{ProjectId, RawBlock};

/// Either a bare array of blocks or the same body the render endpoint takes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BlocksFile {
    Bare(Vec<RawBlock>),
    Request {
        blocks: Vec<RawBlock>,
        #[serde(default, rename = "projectId")]
        project_id: Option<ProjectId>,
    },
}

/// Blocks to render and the project they are scoped to.
#[derive(Debug)]
pub struct RenderInput {
    pub project_id: Option<ProjectId>,
    pub blocks: Vec<RawBlock>,
}

impl RenderInput {
    pub fn parse(json: &str) -> Result<Self> {
        let file: BlocksFile = serde_json::from_str(json).context("not a block list")?;
        Ok(match file {
            BlocksFile::Bare(blocks) => Self {
                project_id: None,
                blocks,
            },
            BlocksFile::Request { blocks, project_id } => Self { project_id, blocks },
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&json).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// `--project` on the command line wins over the file.
    pub fn with_project(mut self, project: Option<String>) -> Self {
        if let Some(project) = project {
            self.project_id = Some(ProjectId::new(project));
        }
        self
    }
}
