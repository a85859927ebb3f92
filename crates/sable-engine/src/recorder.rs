//! Applies task results to the analysis cache

use std::collections::BTreeSet;

use sable_core::{AnalysisException, ContentFetch, Source};

use crate::cache::CachedValue;
use crate::context::AnalysisContext;
use crate::error::EngineError;
use crate::incremental::content_fingerprint;
use crate::task::{
    BuildDartElementModelTask, GenerateDartHintsTask, GetContentTask, IncrementalAnalysisTask,
    ParseDartTask, ResolveDartDependenciesTask, ResolveDartUnitTask, ScanDartTask, TaskVisitor,
};

/// The context's visitor. Its output is the set of sources whose cached
/// results changed.
pub(crate) struct ResultRecorder<'a> {
    pub(crate) context: &'a mut AnalysisContext,
}

type Recorded = Result<Vec<Source>, EngineError>;

impl ResultRecorder<'_> {
    fn record_failure(&self, source: &Source, exception: AnalysisException) -> Vec<Source> {
        self.context.cache.update(source, |entry| {
            entry.record_parse_failure(exception);
        });
        vec![source.clone()]
    }
}

impl TaskVisitor for ResultRecorder<'_> {
    type Output = Vec<Source>;
    type Error = EngineError;

    fn visit_get_content(&mut self, task: GetContentTask) -> Recorded {
        let source = task.source().clone();
        let description = task.description();
        if task.is_pending() {
            self.context.pending.insert(source, task);
            return Ok(Vec::new());
        }
        let content = match task.into_outcome().into_result(|| description)? {
            Ok(ContentFetch::Ready(content)) => content,
            Ok(ContentFetch::Pending) => return Ok(Vec::new()),
            Err(exception) => return Ok(self.record_failure(&source, exception)),
        };
        let options = self.context.options;
        let recorded = self.context.cache.update(&source, |entry| {
            if entry.content != CachedValue::InProcess {
                return false;
            }
            entry.modification_time = content.modification_time;
            entry.fingerprint = Some(content_fingerprint(&content.data, &options));
            entry.content = CachedValue::Valid(content.data.clone());
            true
        });
        if recorded == Some(true) {
            Ok(vec![source])
        } else {
            tracing::warn!("Discarding contents of {} that were not requested", source);
            Ok(Vec::new())
        }
    }

    fn visit_scan_dart(&mut self, task: ScanDartTask) -> Recorded {
        let source = task.source().clone();
        let description = task.description();
        match task.into_outcome().into_result(|| description)? {
            Ok(output) => {
                let recorded = self
                    .context
                    .cache
                    .record(&source, output.modification_time, |entry| {
                        entry.scan = CachedValue::Valid(output.clone());
                    });
                Ok(if recorded { vec![source] } else { Vec::new() })
            }
            Err(exception) => Ok(self.record_failure(&source, exception)),
        }
    }

    fn visit_parse_dart(&mut self, task: ParseDartTask) -> Recorded {
        let source = task.source().clone();
        let description = task.description();
        match task.into_outcome().into_result(|| description)? {
            Ok(output) => {
                let kind = output.kind();
                let recorded = self
                    .context
                    .cache
                    .record(&source, output.modification_time, |entry| {
                        entry.kind = CachedValue::Valid(kind);
                        entry.line_info = CachedValue::Valid(output.line_info.clone());
                        entry.parsed_unit = CachedValue::Valid(output.unit.clone());
                        entry.parse_errors = CachedValue::Valid(output.errors.clone());
                        entry.scan.flush();
                    });
                Ok(if recorded { vec![source] } else { Vec::new() })
            }
            Err(exception) => Ok(self.record_failure(&source, exception)),
        }
    }

    fn visit_resolve_dart_dependencies(&mut self, task: ResolveDartDependenciesTask) -> Recorded {
        let source = task.source().clone();
        let modification_time = task.modification_time();
        let description = task.description();
        match task.into_outcome().into_result(|| description)? {
            Ok(dependencies) => {
                let discovered: BTreeSet<Source> = dependencies
                    .libraries()
                    .into_iter()
                    .chain(dependencies.included.iter().cloned())
                    .collect();
                let recorded = self.context.cache.record(&source, modification_time, |entry| {
                    entry.dependencies = CachedValue::Valid(dependencies);
                });
                if !recorded {
                    return Ok(Vec::new());
                }
                for dependency in &discovered {
                    if self.context.cache.ensure(dependency) {
                        tracing::debug!("Discovered {} through {}", dependency, source);
                    }
                }
                Ok(vec![source])
            }
            Err(exception) => {
                self.context.cache.record(&source, modification_time, |entry| {
                    entry.dependencies = CachedValue::Error;
                    entry.exception = Some(exception);
                });
                Ok(vec![source])
            }
        }
    }

    fn visit_build_dart_element_model(&mut self, task: BuildDartElementModelTask) -> Recorded {
        let cycle: Vec<(Source, i64, Vec<Source>)> = task
            .libraries()
            .iter()
            .map(|library| {
                let parts = library.parts.iter().map(|part| part.source.clone()).collect();
                (library.source.clone(), library.modification_time, parts)
            })
            .collect();
        let description = task.description();
        let mut model = match task.into_outcome().into_result(|| description)? {
            Ok(model) => model,
            Err(exception) => {
                let mut changed = Vec::new();
                for (source, modification_time, parts) in cycle {
                    self.context.cache.record(&source, modification_time, |entry| {
                        entry.element = CachedValue::Error;
                        entry.build_errors = CachedValue::Valid(Vec::new());
                        entry.resolved_unit = CachedValue::Error;
                        entry.hints = CachedValue::Error;
                        entry.exception = Some(exception.clone());
                    });
                    for part in parts {
                        self.context.cache.update(&part, |entry| {
                            if entry.resolved_unit.needs_computation() {
                                entry.resolved_unit = CachedValue::Error;
                            }
                        });
                    }
                    changed.push(source);
                }
                return Ok(changed);
            }
        };

        if model.libraries.contains_key(&sable_core::DartSdk::core_source()) {
            self.context.type_provider = None;
        }
        let mut changed = Vec::new();
        for (source, element) in &model.libraries {
            let Some(&modification_time) = model.modification_times.get(source) else {
                continue;
            };
            let errors = model.errors.remove(source).unwrap_or_default();
            let recorded = self.context.cache.record(source, modification_time, |entry| {
                entry.element = CachedValue::Valid(element.clone());
                entry.build_errors = CachedValue::Valid(errors);
            });
            if recorded {
                changed.push(source.clone());
            }
        }
        // Anything left was reported against a part
        for (source, errors) in model.errors {
            let Some(&modification_time) = model.modification_times.get(&source) else {
                continue;
            };
            if self.context.cache.record(&source, modification_time, |entry| {
                entry.build_errors = CachedValue::Valid(errors);
            }) {
                changed.push(source);
            }
        }
        changed.sort();
        Ok(changed)
    }

    fn visit_resolve_dart_unit(&mut self, task: ResolveDartUnitTask) -> Recorded {
        let source = task.source().clone();
        let modification_time = task.modification_time();
        let description = task.description();
        let recorded = match task.into_outcome().into_result(|| description)? {
            Ok(resolution) => self.context.cache.record(&source, modification_time, |entry| {
                entry.resolved_unit = CachedValue::Valid(resolution.resolved_unit);
                entry.resolution_errors = CachedValue::Valid(resolution.errors);
            }),
            Err(exception) => self.context.cache.record(&source, modification_time, |entry| {
                entry.resolved_unit = CachedValue::Error;
                entry.resolution_errors = CachedValue::Valid(Vec::new());
                entry.exception = Some(exception);
            }),
        };
        Ok(if recorded { vec![source] } else { Vec::new() })
    }

    fn visit_generate_dart_hints(&mut self, task: GenerateDartHintsTask) -> Recorded {
        let library = task.library_source().clone();
        let description = task.description();
        match task.into_outcome().into_result(|| description)? {
            Ok(hints) => {
                let mut changed = Vec::new();
                for (source, data) in hints {
                    if self.context.cache.record(&source, data.modification_time, |entry| {
                        entry.hints = CachedValue::Valid(data.data);
                    }) {
                        changed.push(source);
                    }
                }
                changed.sort();
                Ok(changed)
            }
            Err(exception) => {
                self.context.cache.update(&library, |entry| {
                    entry.hints = CachedValue::Error;
                    entry.exception = Some(exception);
                });
                Ok(vec![library])
            }
        }
    }

    fn visit_incremental_analysis(&mut self, task: IncrementalAnalysisTask) -> Recorded {
        let description = task.description();
        let (cache, outcome) = task.into_parts();
        let updated = match outcome.into_result(|| description)? {
            Ok(updated) => updated,
            Err(_) => None,
        };
        let (Some(cache), Some(updated)) = (cache, updated) else {
            return Ok(Vec::new());
        };

        let previous = cache.previous;
        let restored = self.context.cache.update(&cache.source, |entry| {
            if entry.content != CachedValue::Invalid {
                return false;
            }
            entry.modification_time = cache.modification_time;
            entry.content = CachedValue::Valid(cache.new_contents.clone());
            entry.fingerprint = Some(cache.new_fingerprint.clone());
            entry.kind = previous.kind.clone();
            entry.line_info = previous.line_info.clone();
            entry.parsed_unit = previous.parsed_unit.clone();
            entry.parse_errors = previous.parse_errors.clone();
            entry.dependencies = previous.dependencies.clone();
            entry.resolved_unit = CachedValue::Valid(updated);
            entry.resolution_errors = previous.resolution_errors.clone();
            true
        });
        if restored == Some(true) {
            tracing::debug!("Reused the resolved unit of {}", cache.source);
            Ok(vec![cache.source])
        } else {
            Ok(Vec::new())
        }
    }

    fn visit_wait_for_async(&mut self) -> Recorded {
        Ok(Vec::new())
    }
}
