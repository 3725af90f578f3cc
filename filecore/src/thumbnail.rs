//! Thumbnail generation, per spec.md §4.E step 2 and §6's freedesktop
//! thumbnail-cache contract.
//!
//! Cache layout follows the XDG thumbnail spec: `<md5(uri)>.png` under the
//! user's thumbnail cache directory (`directories::BaseDirs::cache_dir()`),
//! with failure markers under a parallel `fail/<thumbnailer>/` directory so
//! a permanently-unthumbnailable file isn't retried every time it's shown.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::location::Location;
use crate::task::Cancellable;

/// Bitmap formats decoded in-process by the `image` crate, rather than
/// shelled out to an external thumbnailer.
const NATIVE_MIME_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/gif", "image/bmp", "image/webp"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThumbnailState {
    Ready(PathBuf),
    Failed,
}

fn cache_root() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.cache_dir().join("thumbnails").join("normal"))
}

fn fail_root() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.cache_dir().join("thumbnails").join("fail").join("filecore"))
}

fn cache_key(uri: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(uri.as_bytes());
    format!("{:x}.png", hasher.finalize())
}

/// Runs the lookup/generate chain. Called on a worker thread from
/// [`crate::node::FileNode::get_thumbnail`]. `thumbnailer_command`, if
/// given, is the `argv` of an external thumbnailer tried for any mime type
/// the in-process decoder doesn't natively handle.
pub fn generate(
    location: &Location,
    thumbnailer_command: Option<&[String]>,
    cancellable: &Cancellable,
) -> Result<ThumbnailState> {
    cancellable.check()?;
    let uri = location.to_uri();
    let key = cache_key(&uri);

    if let Some(root) = cache_root() {
        let cached = root.join(&key);
        if is_fresh(&cached, location.path()) {
            return Ok(ThumbnailState::Ready(cached));
        }
    }

    if let Some(fail_dir) = fail_root() {
        if fail_dir.join(&key).exists() {
            return Ok(ThumbnailState::Failed);
        }
    }

    cancellable.check()?;
    let mime = mime_guess::from_path(location.path()).first().map(|m| m.essence_str().to_string());

    let root = cache_root().ok_or_else(|| Error::BackendUnavailable("no cache dir".into()))?;
    std::fs::create_dir_all(&root)?;
    let dest = root.join(&key);

    let generated = match mime.as_deref() {
        Some(m) if NATIVE_MIME_TYPES.contains(&m) => {
            decode_in_process(location.path()).and_then(|img| img.save(&dest).map_err(|e| Error::Other(e.to_string())))
        }
        Some(m) => invoke_external_thumbnailer(location.path(), m, thumbnailer_command, &dest),
        None => Err(Error::UnsupportedFormat("unknown mime type".into())),
    };

    match generated {
        Ok(()) => Ok(ThumbnailState::Ready(dest)),
        Err(_) => {
            let _ = std::fs::remove_file(&dest);
            if let Some(fail_dir) = fail_root() {
                std::fs::create_dir_all(&fail_dir)?;
                std::fs::write(fail_dir.join(&key), b"")?;
            }
            Ok(ThumbnailState::Failed)
        }
    }
}

/// A cached thumbnail is valid only as long as it's newer than the source
/// file's own modification time — the freedesktop spec's `Thumb::MTime`
/// check, simplified to filesystem mtime comparison.
fn is_fresh(thumbnail: &Path, source: &Path) -> bool {
    let (Ok(thumb_meta), Ok(source_meta)) = (thumbnail.metadata(), source.metadata()) else {
        return false;
    };
    let (Ok(thumb_mtime), Ok(source_mtime)) = (thumb_meta.modified(), source_meta.modified()) else {
        return false;
    };
    thumb_mtime >= source_mtime
}

fn decode_in_process(path: &Path) -> Result<image::DynamicImage> {
    let img = image::open(path).map_err(|e| Error::Other(e.to_string()))?;
    Ok(img.thumbnail(256, 256))
}

/// Out-of-process thumbnailer invocation, per §1's "external thumbnailer
/// process (invoked as a subprocess)" collaborator boundary and §4.E step
/// 3. `command` is a freedesktop-`Exec`-style argv with `%i`/`%o`/`%s`
/// placeholders for the source path, destination PNG path, and requested
/// pixel size; the thumbnailer is expected to write `dest` itself. `None`
/// (no thumbnailer configured) and a nonzero exit both fail over to the
/// `Failed` marker at the call site.
fn invoke_external_thumbnailer(path: &Path, mime: &str, command: Option<&[String]>, dest: &Path) -> Result<()> {
    let Some(argv) = command else {
        return Err(Error::UnsupportedFormat(format!(
            "no in-process decoder and no thumbnailer subprocess configured for {} ({mime})",
            path.display()
        )));
    };
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::UnsupportedFormat("thumbnailer_command is empty".into()));
    };
    let render = |arg: &String| {
        arg.replace("%i", &path.to_string_lossy())
            .replace("%o", &dest.to_string_lossy())
            .replace("%s", "256")
    };
    let status = std::process::Command::new(program)
        .args(args.iter().map(render))
        .status()
        .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
    if status.success() && dest.exists() {
        Ok(())
    } else {
        Err(Error::Other(format!("thumbnailer for {mime} exited with {status}")))
    }
}
