//! Deployment tree rendering.
//!
//! Each deployment mode has a fixed tree of files. Static files are copied to
//! the output root as they are. Templated files are expanded once for the
//! whole devnet (co-located) or once per node into `node<i>/` (remote).

use crate::error::{DevnetError, Result};
use crate::fs;
use crate::layout::Layout;
use crate::templates::{self, DevnetView, NodeView};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Expands a template against its context.
pub type RenderFn<C> = fn(&C) -> askama::Result<String>;

/// Where an entry's contents come from.
pub enum Source<C> {
    /// Fixed contents.
    Static(&'static str),
    /// Contents expanded from a template.
    Template(RenderFn<C>),
}

/// One file of a deployment tree.
pub struct TreeEntry<C> {
    /// File name, relative to the output root or node directory.
    pub name: &'static str,
    /// Contents source.
    pub source: Source<C>,
    /// Whether the file is written executable.
    pub executable: bool,
}

impl<C> TreeEntry<C> {
    fn templated(name: &'static str, render: RenderFn<C>, executable: bool) -> Self {
        Self {
            name,
            source: Source::Template(render),
            executable,
        }
    }

    fn fixed(name: &'static str, contents: &'static str, executable: bool) -> Self {
        Self {
            name,
            source: Source::Static(contents),
            executable,
        }
    }

    /// Whether the entry is expanded from a template.
    pub fn is_template(&self) -> bool {
        matches!(self.source, Source::Template(_))
    }

    fn expand(&self, render: RenderFn<C>, context: &C) -> Result<String> {
        render(context).map_err(|source| DevnetError::Render {
            template: self.name.to_string(),
            source,
        })
    }
}

/// The co-located tree: one compose manifest for all nodes.
#[must_use]
pub fn colocated_tree() -> Vec<TreeEntry<DevnetView>> {
    vec![
        TreeEntry::templated("docker-compose.yml", templates::docker_compose, false),
        TreeEntry::templated("docker-start.sh", templates::docker_start, true),
        TreeEntry::fixed("docker-clean.sh", templates::DOCKER_CLEAN, true),
    ]
}

/// The remote tree: per-host scripts.
#[must_use]
pub fn remote_tree() -> Vec<TreeEntry<NodeView>> {
    vec![
        TreeEntry::templated("setup.sh", templates::setup, true),
        TreeEntry::templated("start-execution.sh", templates::start_execution, true),
        TreeEntry::templated("start-consensus.sh", templates::start_consensus, true),
        TreeEntry::fixed("clean.sh", templates::CLEAN, true),
    ]
}

/// What a render pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Number of expansions per templated file.
    pub renders: BTreeMap<&'static str, usize>,
    /// Every file written, static files included.
    pub written: Vec<PathBuf>,
    /// Shared templated originals removed from the output root.
    pub removed: Vec<PathBuf>,
}

impl RenderReport {
    /// Number of times `name` was expanded.
    #[must_use]
    pub fn render_count(&self, name: &str) -> usize {
        self.renders.get(name).copied().unwrap_or(0)
    }
}

struct PendingFile {
    path: PathBuf,
    contents: String,
    executable: bool,
}

async fn write_all(files: Vec<PendingFile>) -> Result<Vec<PathBuf>> {
    let writes = files.into_iter().map(|file| async move {
        if file.executable {
            fs::write_executable(&file.path, &file.contents).await?;
        } else {
            fs::write(&file.path, &file.contents).await?;
        }
        tracing::debug!(path = %file.path.display(), "Wrote deployment file");
        Ok::<_, DevnetError>(file.path)
    });
    try_join_all(writes).await
}

/// Renders deployment trees into an output root.
#[derive(Debug)]
pub struct Renderer<'a> {
    layout: &'a Layout,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer writing under `layout`'s root.
    #[must_use]
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    fn check_nodes(&self, devnet: &DevnetView) -> Result<()> {
        if devnet.nodes.len() != self.layout.len() {
            return Err(DevnetError::Precondition(format!(
                "render context has {} nodes, layout has {}",
                devnet.nodes.len(),
                self.layout.len()
            )));
        }
        Ok(())
    }

    /// Writes the co-located tree to the output root, expanding each
    /// templated file exactly once.
    ///
    /// # Errors
    ///
    /// Fails if any template fails to expand (nothing is written then) or
    /// on I/O errors.
    pub async fn render_colocated(&self, devnet: &DevnetView) -> Result<RenderReport> {
        self.check_nodes(devnet)?;
        let mut report = RenderReport::default();
        let mut pending = Vec::new();

        for entry in colocated_tree() {
            let contents = match entry.source {
                Source::Static(contents) => contents.to_string(),
                Source::Template(render) => {
                    *report.renders.entry(entry.name).or_default() += 1;
                    entry.expand(render, devnet)?
                }
            };
            pending.push(PendingFile {
                path: self.layout.root_file(entry.name),
                contents,
                executable: entry.executable,
            });
        }

        fs::create_dir_all(self.layout.root()).await?;
        report.written = write_all(pending).await?;
        tracing::info!(files = report.written.len(), "Co-located deployment rendered");
        Ok(report)
    }

    /// Writes the remote tree: static files to the output root, templated
    /// files once per node into that node's directory. The shared
    /// templated original never remains at the root.
    ///
    /// # Errors
    ///
    /// Fails if any expansion fails (nothing is written then) or on I/O
    /// errors.
    pub async fn render_remote(&self, devnet: &DevnetView) -> Result<RenderReport> {
        self.check_nodes(devnet)?;
        let views = (0..devnet.nodes.len())
            .map(|i| {
                NodeView::new(devnet, i).ok_or_else(|| {
                    DevnetError::Precondition(format!("no render context for node {i}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let tree = remote_tree();
        let mut report = RenderReport::default();
        let mut pending = Vec::new();

        for entry in &tree {
            match entry.source {
                Source::Static(contents) => pending.push(PendingFile {
                    path: self.layout.root_file(entry.name),
                    contents: contents.to_string(),
                    executable: entry.executable,
                }),
                Source::Template(render) => {
                    for view in &views {
                        pending.push(PendingFile {
                            path: self.layout.node(view.index).dir.join(entry.name),
                            contents: entry.expand(render, view)?,
                            executable: entry.executable,
                        });
                        *report.renders.entry(entry.name).or_default() += 1;
                    }
                }
            }
        }

        fs::create_dir_all(self.layout.root()).await?;
        for paths in self.layout.nodes() {
            fs::create_dir_all(&paths.dir).await?;
        }
        report.written = write_all(pending).await?;

        for entry in tree.iter().filter(|e| e.is_template()) {
            let original = self.layout.root_file(entry.name);
            if fs::remove_file_if_exists(&original).await? {
                report.removed.push(original);
            }
        }

        tracing::info!(
            files = report.written.len(),
            nodes = views.len(),
            "Remote deployment rendered"
        );
        Ok(report)
    }
}
