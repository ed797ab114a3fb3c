//! Content hashing of static assets.
//!
//! Every font, image, script and stylesheet in the source tree is hashed once
//! and written under `assets/<class>/<digest>.<ext>`. The output name depends
//! only on the bytes and the type, so:
//! - identical content always lands at the identical path,
//! - any change to the content produces a new path,
//! - two byte-identical sources share one physical output file.
//!
//! The original→hashed mapping is returned as an [`AssetMap`] for the render
//! stage. Stylesheets are rewritten through the same mapping before they are
//! hashed, so a `url(../fonts/a.woff)` ends up pointing at the hashed font.

mod css;
pub mod types;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::ASSETS_OUTPUT_DIR;
use crate::util::hash::{ContentHash, hash_bytes};
use crate::util::to_key;

pub use types::{Asset, AssetClass, AssetError, AssetMap, HashedAsset, HashedAssets};

/// Read every asset under `source_dir`.
///
/// Files directly in the source root are not assets (they are copied through
/// unchanged by the build), and anything under `exclude` is skipped. Hidden
/// files and directories are ignored. Results are sorted by source path.
pub fn collect_assets(source_dir: &Path, exclude: &[PathBuf]) -> Result<Vec<Asset>, AssetError> {
  let mut assets = Vec::new();

  let walker = WalkDir::new(source_dir)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      let hidden = e.depth() > 0 && e.file_name().to_str().map(|n| n.starts_with('.')).unwrap_or(false);
      !hidden && !exclude.iter().any(|ex| e.path().starts_with(ex))
    });

  for entry in walker {
    let entry = entry.map_err(|e| AssetError::Walk {
      path: source_dir.to_path_buf(),
      message: e.to_string(),
    })?;

    if !entry.file_type().is_file() || entry.depth() < 2 {
      continue;
    }

    let path = entry.path();
    let Some(class) = path
      .extension()
      .and_then(|ext| ext.to_str())
      .and_then(AssetClass::from_extension)
    else {
      continue;
    };

    let rel = path.strip_prefix(source_dir).unwrap_or(path);
    let content = fs::read(path).map_err(|source| AssetError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let mime = mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string();

    debug!(asset = %rel.display(), class = %class, size = content.len(), "collected asset");

    assets.push(Asset {
      source: to_key(rel),
      content,
      mime,
      class,
    });
  }

  assets.sort_by(|a, b| a.source.cmp(&b.source));
  Ok(assets)
}

/// Compute the hashed output path for an asset.
pub fn hashed_path(asset: &Asset) -> Result<String, AssetError> {
  output_path(asset, &hash_bytes(&asset.content))
}

fn output_path(asset: &Asset, hash: &ContentHash) -> Result<String, AssetError> {
  let ext = asset
    .extension()
    .ok_or_else(|| AssetError::NoExtension(asset.source.clone()))?;
  Ok(format!(
    "{}/{}/{}.{}",
    ASSETS_OUTPUT_DIR,
    asset.class,
    hash.short(),
    ext
  ))
}

/// Hash every asset and build the name mapping.
///
/// Stylesheets go last: their `url(...)` references are rewritten through the
/// mapping of the other assets before they are hashed, so the hash covers the
/// rewritten bytes. Assets sharing an output path are collapsed into one
/// [`HashedAsset`] that lists all of their sources.
pub fn hash_assets(assets: Vec<Asset>) -> Result<HashedAssets, AssetError> {
  let mut map = AssetMap::new();
  let mut outputs: BTreeMap<String, HashedAsset> = BTreeMap::new();

  let (stylesheets, leaves): (Vec<Asset>, Vec<Asset>) =
    assets.into_iter().partition(|a| a.class == AssetClass::Styles);

  for asset in leaves {
    add_hashed(&mut map, &mut outputs, asset)?;
  }
  for mut asset in stylesheets {
    asset.content = css::rewrite_stylesheet(&asset.source, &asset.content, &map);
    add_hashed(&mut map, &mut outputs, asset)?;
  }

  let files: Vec<HashedAsset> = outputs.into_values().collect();
  info!(assets = map.len(), files = files.len(), "hashed assets");

  Ok(HashedAssets { map, files })
}

fn add_hashed(
  map: &mut AssetMap,
  outputs: &mut BTreeMap<String, HashedAsset>,
  asset: Asset,
) -> Result<(), AssetError> {
  let hash = hash_bytes(&asset.content);
  let output = output_path(&asset, &hash)?;
  map.insert(asset.source.clone(), output.clone());

  match outputs.get_mut(&output) {
    Some(existing) => {
      debug!(source = %asset.source, output = %output, "asset shares content with an earlier asset");
      existing.sources.push(asset.source);
    }
    None => {
      outputs.insert(
        output.clone(),
        HashedAsset {
          output,
          hash,
          content: asset.content,
          sources: vec![asset.source],
        },
      );
    }
  }
  Ok(())
}

/// Write hashed assets into the output directory.
///
/// Returns the output keys written.
pub fn write_assets(hashed: &HashedAssets, out_dir: &Path) -> Result<Vec<String>, AssetError> {
  let mut written = Vec::with_capacity(hashed.files.len());

  for file in &hashed.files {
    let dest = out_dir.join(&file.output);
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).map_err(|source| AssetError::Write {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    fs::write(&dest, &file.content).map_err(|source| AssetError::Write {
      path: dest.clone(),
      source,
    })?;
    written.push(file.output.clone());
  }

  Ok(written)
}
