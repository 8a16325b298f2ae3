//! The compilation pipeline.
//!
//! Every stage is an extensible step; plugins may override or transform any
//! of them. The default bodies below only describe what happens when no
//! plugin intervenes. Stage order is fixed by [`Compile`]:
//! `GetModuleSeeds` → `GenerateModuleMaps` → `GenerateBundles` → `BuildOutput`,
//! with `BuildOutput` running `GetUrls` then `EmitRawBundles`.

use crate::core::context::CompilationContext;
use crate::core::models::*;
use crate::core::pluggable::{
    promise, ExecutionContext, ExtensionPoint, Handled, Pluggable, PromiseStep, StreamStep,
};
use crate::infrastructure::set_hash;
use crate::utils::{InterlockError, Logger, Result, Timer};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// One full compile against the session context.
pub async fn compile(cx: &CompilationContext) -> Result<Compilation> {
    promise::<Compile>(cx, ()).await
}

/// Write every artifact of `compilation` under the destination root.
pub async fn save_bundles(cx: &CompilationContext, compilation: Arc<Compilation>) -> Result<Vec<PathBuf>> {
    promise::<SaveBundles>(cx, compilation).await
}

pub struct Compile;

impl Pluggable for Compile {
    const POINT: ExtensionPoint = ExtensionPoint::Compile;
    const DEPENDENCIES: &'static [ExtensionPoint] = &[
        ExtensionPoint::GetModuleSeeds,
        ExtensionPoint::GenerateModuleMaps,
        ExtensionPoint::GenerateBundles,
        ExtensionPoint::BuildOutput,
    ];
    type Args = ();
    type Output = Compilation;
}

impl PromiseStep for Compile {
    fn run(cx: ExecutionContext, _args: ()) -> BoxFuture<'static, Result<Handled<Compilation>>> {
        async move {
            let _timer = Timer::start("compile");
            let seeds = cx.call::<GetModuleSeeds>(()).await?;
            let seed_list: Arc<Vec<ModuleSeed>> = Arc::new(seeds.values().cloned().collect());
            let maps = cx.call::<GenerateModuleMaps>(seed_list).await?;
            let bundles = cx.call::<GenerateBundles>((seeds, maps)).await?;
            let compilation = cx.call::<BuildOutput>(bundles).await?;
            Ok(Handled::Done(compilation))
        }
        .boxed()
    }
}

pub struct GetModuleSeeds;

impl Pluggable for GetModuleSeeds {
    const POINT: ExtensionPoint = ExtensionPoint::GetModuleSeeds;
    type Args = ();
    type Output = Arc<ModuleSeeds>;
}

impl PromiseStep for GetModuleSeeds {
    fn run(cx: ExecutionContext, _args: ()) -> BoxFuture<'static, Result<Handled<Arc<ModuleSeeds>>>> {
        async move {
            Logger::stage("getModuleSeeds");
            let seeds = cx.collaborators.seeds.discover(&cx.opts).await?;
            Ok(Handled::Done(Arc::new(seeds)))
        }
        .boxed()
    }
}

pub struct GenerateModuleMaps;

impl Pluggable for GenerateModuleMaps {
    const POINT: ExtensionPoint = ExtensionPoint::GenerateModuleMaps;
    type Args = Arc<Vec<ModuleSeed>>;
    type Output = Arc<ModuleMaps>;
}

impl PromiseStep for GenerateModuleMaps {
    fn run(cx: ExecutionContext, seeds: Arc<Vec<ModuleSeed>>) -> BoxFuture<'static, Result<Handled<Arc<ModuleMaps>>>> {
        async move {
            Logger::stage("generateModuleMaps");
            let _timer = Timer::start("module mapping");
            let maps = cx
                .collaborators
                .mapper
                .map_modules(&cx.opts, &cx.cache, &seeds)
                .await?;
            Ok(Handled::Done(Arc::new(maps)))
        }
        .boxed()
    }
}

pub struct GenerateBundles;

impl Pluggable for GenerateBundles {
    const POINT: ExtensionPoint = ExtensionPoint::GenerateBundles;
    const DEPENDENCIES: &'static [ExtensionPoint] = &[ExtensionPoint::InterpolateFilename];
    type Args = (Arc<ModuleSeeds>, Arc<ModuleMaps>);
    type Output = Vec<Arc<Bundle>>;
}

impl PromiseStep for GenerateBundles {
    fn run(
        cx: ExecutionContext,
        (seeds, maps): (Arc<ModuleSeeds>, Arc<ModuleMaps>),
    ) -> BoxFuture<'static, Result<Handled<Vec<Arc<Bundle>>>>> {
        async move {
            Logger::stage("generateBundles");
            let split = cx.collaborators.splitter.split(&cx.opts, &seeds, &maps)?;

            let mut bundles = Vec::with_capacity(split.len());
            for bundle in split {
                let mut bundle = Arc::new(bundle);
                let dest = cx.call_sync::<InterpolateFilename>(bundle.clone())?;
                Arc::make_mut(&mut bundle).dest = dest;
                bundles.push(bundle);
            }
            Ok(Handled::Done(bundles))
        }
        .boxed()
    }
}

/// Resolves the `[setHash]` placeholder in a bundle's destination template.
pub struct InterpolateFilename;

impl Pluggable for InterpolateFilename {
    const POINT: ExtensionPoint = ExtensionPoint::InterpolateFilename;
    type Args = Arc<Bundle>;
    type Output = String;
}

impl StreamStep for InterpolateFilename {
    fn run(_cx: &ExecutionContext, bundle: &Arc<Bundle>) -> Result<Handled<String>> {
        let dest = if bundle.dest.contains("[setHash]") {
            bundle.dest.replace("[setHash]", &set_hash(&bundle.module_hashes))
        } else {
            bundle.dest.clone()
        };
        Ok(Handled::Done(dest))
    }
}

/// Module hash → destination of the first bundle that declares it.
pub struct GetUrls;

impl Pluggable for GetUrls {
    const POINT: ExtensionPoint = ExtensionPoint::GetUrls;
    type Args = Vec<Arc<Bundle>>;
    type Output = Urls;
}

impl StreamStep for GetUrls {
    fn run(_cx: &ExecutionContext, bundles: &Vec<Arc<Bundle>>) -> Result<Handled<Urls>> {
        Logger::stage("getUrls");
        let mut urls = Urls::new();
        for bundle in bundles {
            for hash in &bundle.module_hashes {
                urls.entry(hash.clone()).or_insert_with(|| bundle.dest.clone());
            }
        }
        Ok(Handled::Done(urls))
    }
}

pub struct EmitRawBundles;

impl Pluggable for EmitRawBundles {
    const POINT: ExtensionPoint = ExtensionPoint::EmitRawBundles;
    const DEPENDENCIES: &'static [ExtensionPoint] = &[ExtensionPoint::ConstructBundle];
    type Args = (Vec<Arc<Bundle>>, Arc<Urls>);
    type Output = Vec<EmittedArtifact>;
}

impl PromiseStep for EmitRawBundles {
    fn run(
        cx: ExecutionContext,
        (bundles, urls): (Vec<Arc<Bundle>>, Arc<Urls>),
    ) -> BoxFuture<'static, Result<Handled<Vec<EmittedArtifact>>>> {
        async move {
            Logger::stage("emitRawBundles");
            let _timer = Timer::start("code generation");
            let options = CodegenOptions::from(cx.opts.as_ref());

            let per_bundle = bundles.into_iter().map(|bundle| {
                let cx = cx.clone();
                let urls = urls.clone();
                async move { emit_bundle(&cx, bundle, urls, options).await }
            });
            let emitted = try_join_all(per_bundle).await?;

            Ok(Handled::Done(emitted.into_iter().flatten().collect()))
        }
        .boxed()
    }
}

async fn emit_bundle(
    cx: &ExecutionContext,
    bundle: Arc<Bundle>,
    urls: Arc<Urls>,
    options: CodegenOptions,
) -> Result<Vec<EmittedArtifact>> {
    let input = BundleInput {
        modules: bundle.modules.clone(),
        include_runtime: bundle.include_runtime,
        urls: bundle.is_entry.then(|| urls),
        entry_module_hash: if bundle.is_entry {
            bundle.module.as_ref().map(|m| m.hash.clone())
        } else {
            None
        },
    };

    let ast = cx.call::<ConstructBundle>(input).await?;
    let generated = cx.collaborators.codegen.generate(&ast, &bundle.dest, &options)?;
    Logger::bundle_emitted(&bundle.dest, generated.code.len());

    let mut artifacts = Vec::with_capacity(2);
    let map_dest = format!("{}.map", bundle.dest);
    artifacts.push(EmittedArtifact::Bundle {
        bundle,
        raw: generated.code,
    });
    if let Some(map) = generated.map {
        artifacts.push(EmittedArtifact::SourceMap { dest: map_dest, raw: map });
    }
    Ok(artifacts)
}

pub struct ConstructBundle;

impl Pluggable for ConstructBundle {
    const POINT: ExtensionPoint = ExtensionPoint::ConstructBundle;
    type Args = BundleInput;
    type Output = BundleAst;
}

impl PromiseStep for ConstructBundle {
    fn run(cx: ExecutionContext, input: BundleInput) -> BoxFuture<'static, Result<Handled<BundleAst>>> {
        async move {
            let ast = cx.collaborators.constructor.construct(&input)?;
            Ok(Handled::Done(ast))
        }
        .boxed()
    }
}

pub struct BuildOutput;

impl Pluggable for BuildOutput {
    const POINT: ExtensionPoint = ExtensionPoint::BuildOutput;
    const DEPENDENCIES: &'static [ExtensionPoint] =
        &[ExtensionPoint::GetUrls, ExtensionPoint::EmitRawBundles];
    type Args = Vec<Arc<Bundle>>;
    type Output = Compilation;
}

impl PromiseStep for BuildOutput {
    fn run(cx: ExecutionContext, bundles: Vec<Arc<Bundle>>) -> BoxFuture<'static, Result<Handled<Compilation>>> {
        async move {
            Logger::stage("buildOutput");
            let urls = cx.call_sync::<GetUrls>(bundles.clone())?;
            let artifacts = cx.call::<EmitRawBundles>((bundles, Arc::new(urls))).await?;

            let mut bundles = BTreeMap::new();
            for artifact in artifacts {
                let dest = artifact.dest().to_string();
                if bundles.insert(dest.clone(), artifact).is_some() {
                    return Err(InterlockError::config(format!(
                        "more than one bundle is written to {}; add [setHash] to implicitBundleDest",
                        dest
                    )));
                }
            }

            Ok(Handled::Done(Compilation {
                bundles,
                opts: cx.opts.clone(),
                cache: cx.cache.clone(),
            }))
        }
        .boxed()
    }
}

pub struct SaveBundles;

impl Pluggable for SaveBundles {
    const POINT: ExtensionPoint = ExtensionPoint::SaveBundles;
    type Args = Arc<Compilation>;
    type Output = Vec<PathBuf>;
}

impl PromiseStep for SaveBundles {
    fn run(cx: ExecutionContext, compilation: Arc<Compilation>) -> BoxFuture<'static, Result<Handled<Vec<PathBuf>>>> {
        async move {
            Logger::stage("saveBundles");
            let fs = &cx.collaborators.fs;
            let mut written = Vec::with_capacity(compilation.bundles.len());

            for (dest, artifact) in &compilation.bundles {
                let path = cx.opts.dest_root.join(dest);
                if let Some(parent) = path.parent() {
                    fs.create_directory(parent).await?;
                }
                fs.write_file(&path, artifact.raw()).await?;
                written.push(path);
            }
            Ok(Handled::Done(written))
        }
        .boxed()
    }
}
