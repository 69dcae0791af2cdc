use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::OutputFormat;
use crate::error::{RecError, Result};
use crate::inference::Recommendations;
use crate::mapping::UserId;

/// Write the submission: a header line, then one line per target user with the
/// recommended item ids.
pub fn write_recommendations<W: Write>(
    writer: &mut W,
    recommendations: &Recommendations,
    targets: &[UserId],
    format: &OutputFormat,
) -> Result<()> {
    writeln!(
        writer,
        "{}{}{}",
        format.user_caption, format.user_items_sep, format.rec_item_caption
    )?;
    for user in targets {
        let recs = recommendations
            .lists
            .get(user)
            .ok_or(RecError::UnknownUser(*user))?;
        write!(writer, "{user}{}", format.user_items_sep)?;
        for (item, _) in recs {
            write!(writer, "{item}{}", format.item_item_sep)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write every list with its scores as `{user:[(item,score),...]}`, one user
/// per line.
pub fn write_score_dictionary<W: Write>(
    writer: &mut W,
    recommendations: &Recommendations,
    targets: &[UserId],
) -> Result<()> {
    write!(writer, "{{")?;
    for user in targets {
        let recs = recommendations
            .lists
            .get(user)
            .ok_or(RecError::UnknownUser(*user))?;
        let entries: Vec<String> = recs
            .iter()
            .map(|(item, score)| format!("({item},{score})"))
            .collect();
        writeln!(writer, "{user}:[{}]", entries.join(","))?;
    }
    write!(writer, "}}")?;
    Ok(())
}

fn dictionary_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}[DICTIONARY].txt"))
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    Ok(BufWriter::new(file))
}

/// Save the submission to `path` and the score dictionary next to it.
///
/// Returns the path of the dictionary file.
pub fn save_recommendations(
    path: &Path,
    recommendations: &Recommendations,
    targets: &[UserId],
    format: &OutputFormat,
) -> Result<PathBuf> {
    let mut writer = create_file(path)?;
    write_recommendations(&mut writer, recommendations, targets, format)?;
    writer.flush()?;

    let dict_path = dictionary_path(path);
    let mut writer = create_file(&dict_path)?;
    write_score_dictionary(&mut writer, recommendations, targets)?;
    writer.flush()?;

    tracing::info!(
        "Save recommendations of {} users to `{}`",
        targets.len(),
        path.display()
    );
    Ok(dict_path)
}
