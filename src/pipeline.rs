//! Orchestration: load the persisted relation trees or build them with a
//! single streaming pass, then run the category closure.
//!
//! The run moves through `NoCache -> Building -> Cached -> Closing`; a parse
//! or cache-write failure lands in the terminal `Failed` state and aborts
//! the run. A present, valid tree file skips the XML pass entirely
//! (`NoCache -> Cached`). Each pipeline owns its graphs exclusively;
//! concurrent runs against the same tree file must be serialized by the
//! caller.

use crate::closure::{ClosureEngine, ClosureRequest};
use crate::config::PROGRESS_INTERVAL;
use crate::parser::DumpParser;
use crate::reader;
use crate::relations::{RelationGraphBuilder, RelationTrees};
use crate::stats::FilterStats;
use crate::tree;
use crate::window::WindowLimits;
use anyhow::Result;
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NoCache,
    Building,
    Cached,
    Closing,
    Failed,
}

pub struct ImportPipeline<'s> {
    state: PipelineState,
    limits: WindowLimits,
    rebuild: bool,
    stats: &'s FilterStats,
}

impl<'s> ImportPipeline<'s> {
    /// `rebuild` ignores an existing tree file and forces the XML pass.
    pub fn new(limits: WindowLimits, rebuild: bool, stats: &'s FilterStats) -> Self {
        Self {
            state: PipelineState::NoCache,
            limits,
            rebuild,
            stats,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Runs the full pipeline: trees (cached or rebuilt), then the closure.
    pub fn page_list(
        &mut self,
        input: &str,
        request: &ClosureRequest,
    ) -> Result<FxHashSet<String>> {
        let trees = self.trees(input)?;
        self.transition(PipelineState::Closing);
        info!(
            roots = request.root_categories.len(),
            depth = request.recursion_depth,
            "Computing category closure"
        );
        Ok(ClosureEngine::new(&trees).run(request))
    }

    /// Loads the persisted trees, or builds and persists them when the cache
    /// misses. Any failure is terminal for this pipeline.
    pub fn trees(&mut self, input: &str) -> Result<RelationTrees> {
        match self.load_or_build(input) {
            Ok(trees) => Ok(trees),
            Err(e) => {
                self.transition(PipelineState::Failed);
                Err(e)
            }
        }
    }

    fn load_or_build(&mut self, input: &str) -> Result<RelationTrees> {
        let path = tree::tree_path(input);
        if !self.rebuild {
            if let Some(trees) = tree::try_load(&path, input)? {
                self.transition(PipelineState::Cached);
                return Ok(trees);
            }
        } else {
            info!("Cache disabled, building fresh relation trees");
        }

        self.transition(PipelineState::Building);
        let trees = self.build_trees(input)?;
        tree::save(&trees, input)?;
        self.transition(PipelineState::Cached);
        Ok(trees)
    }

    /// One streaming pass: parse pages, feed the newest retained revision of
    /// each into the relation-graph builder.
    fn build_trees(&self, input: &str) -> Result<RelationTrees> {
        info!("Building relation trees from: {}", input);
        let source = reader::open_dump(input)?;
        let parser = DumpParser::new(source, self.limits, self.stats);
        let mut builder = RelationGraphBuilder::new();
        let pb = ProgressBar::new_spinner();

        let mut pages: u64 = 0;
        for bundle in parser {
            let bundle = bundle?;
            let text = bundle
                .current_revision()
                .map(|r| r.text.as_str())
                .unwrap_or_default();
            builder.observe(&bundle.page, text);
            pages += 1;
            if pages % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }
        }
        pb.finish_and_clear();

        let trees = builder.finish();
        self.stats.add_template_edges(trees.templates.edge_count() as u64);
        self.stats.add_include_edges(trees.includes.edge_count() as u64);
        self.stats
            .add_reference_edges(trees.references.edge_count() as u64);
        info!(
            pages = trees.references.node_count(),
            "Relation trees built"
        );
        Ok(trees)
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_dump() -> &'static str {
        r#"<mediawiki>
            <page>
                <title>A</title>
                <id>1</id>
                <revision>
                    <id>100</id>
                    <timestamp>2020-01-01T00:00:00Z</timestamp>
                    <contributor><username>T</username></contributor>
                    <text>[[Category:Root]]</text>
                </revision>
            </page>
            <page>
                <title>B</title>
                <id>2</id>
                <revision>
                    <id>200</id>
                    <timestamp>2020-01-01T00:00:00Z</timestamp>
                    <contributor><username>T</username></contributor>
                    <text>unrelated</text>
                </revision>
            </page>
        </mediawiki>"#
    }

    fn write_dump(dir: &TempDir) -> String {
        let path = dir.path().join("dump.xml");
        fs::write(&path, sample_dump()).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn request(roots: &[&str]) -> ClosureRequest {
        ClosureRequest {
            root_categories: roots.iter().map(|r| r.to_string()).collect(),
            allowed_pages: FxHashSet::default(),
            recursion_depth: 1,
            include_roots: false,
        }
    }

    #[test]
    fn builds_trees_and_persists_them() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(&dir);
        let stats = FilterStats::new();

        let mut pipeline = ImportPipeline::new(WindowLimits::default(), false, &stats);
        let trees = pipeline.trees(&input).unwrap();

        assert_eq!(pipeline.state(), PipelineState::Cached);
        assert!(trees.references.contains("A"));
        assert!(tree::tree_path(&input).exists());
        assert_eq!(stats.pages(), 2);
    }

    #[test]
    fn second_run_uses_the_persisted_trees() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(&dir);
        let stats = FilterStats::new();

        // Plant a recognizable tree file; a cache hit returns it verbatim
        // instead of re-parsing the dump.
        let mut planted = RelationTrees::default();
        planted.references.add_edge("Planted", "Category:Root".to_string());
        tree::save(&planted, &input).unwrap();

        let mut pipeline = ImportPipeline::new(WindowLimits::default(), false, &stats);
        let trees = pipeline.trees(&input).unwrap();

        assert_eq!(pipeline.state(), PipelineState::Cached);
        assert_eq!(trees, planted);
        assert_eq!(stats.pages(), 0);
    }

    #[test]
    fn rebuild_ignores_the_persisted_trees() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(&dir);
        let stats = FilterStats::new();

        let mut planted = RelationTrees::default();
        planted.references.add_edge("Planted", "Category:Root".to_string());
        tree::save(&planted, &input).unwrap();

        let mut pipeline = ImportPipeline::new(WindowLimits::default(), true, &stats);
        let trees = pipeline.trees(&input).unwrap();

        assert!(trees.references.contains("A"));
        assert!(!trees.references.contains("Planted"));
        assert_eq!(stats.pages(), 2);
    }

    #[test]
    fn failure_is_terminal() {
        let stats = FilterStats::new();
        let mut pipeline = ImportPipeline::new(WindowLimits::default(), false, &stats);
        assert!(pipeline.trees("/nonexistent/dump.xml").is_err());
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn malformed_dump_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.xml");
        fs::write(&path, "<mediawiki><page><title>A</title><id>zzz</id></page></mediawiki>")
            .unwrap();
        let stats = FilterStats::new();

        let mut pipeline = ImportPipeline::new(WindowLimits::default(), false, &stats);
        let result = pipeline.page_list(path.to_str().unwrap(), &request(&["Category:Root"]));

        assert!(result.is_err());
        assert_eq!(pipeline.state(), PipelineState::Failed);
        // No tree file may be left behind for a later run to trust.
        assert!(!tree::tree_path(path.to_str().unwrap()).exists());
    }

    #[test]
    fn page_list_runs_the_closure() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(&dir);
        let stats = FilterStats::new();

        let mut pipeline = ImportPipeline::new(WindowLimits::default(), false, &stats);
        let mut req = request(&["Category:Root"]);
        req.allowed_pages.insert("B".to_string());
        let pages = pipeline.page_list(&input, &req).unwrap();

        assert_eq!(pipeline.state(), PipelineState::Closing);
        let mut names: Vec<&String> = pages.iter().collect();
        names.sort();
        assert_eq!(names, vec!["A", "B"]);
    }
}
