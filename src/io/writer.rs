use anyhow::{anyhow, Result};
use std::io::Write;

use crate::list::ScwList;

/// Write the non-null windows of `list` as bedGraph.
pub fn write_bedgraph<W: Write>(writer: &mut W, list: &ScwList, track_name: &str) -> Result<()> {
    writeln!(writer, "track type=bedGraph name=\"{track_name}\"")?;

    for (index, view) in list.shards().present() {
        let chromosome = list
            .chromosomes()
            .get(index)
            .ok_or_else(|| anyhow!("chromosome index {index} outside the genome"))?;
        for window in view.iter().filter(|w| !w.is_null()) {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                chromosome.name(),
                window.start,
                window.stop,
                window.score
            )?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Render `list` into a bedGraph string (useful for tests and snapshots).
pub fn render_bedgraph(list: &ScwList, track_name: &str) -> Result<String> {
    let mut buffer = Vec::new();
    write_bedgraph(&mut buffer, list, track_name)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered bedGraph is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::ChromosomeSet;
    use crate::list::{ScwListBuilder, ScwListType};
    use crate::window::ScorePrecision;
    use std::sync::Arc;

    #[test]
    fn null_windows_are_not_written() {
        let genome = Arc::new(ChromosomeSet::new([("chr1", 40), ("chr2", 40)]).unwrap());
        let mut builder =
            ScwListBuilder::new(genome, ScwListType::Bin { bin_size: 10 }, ScorePrecision::Bit32);
        builder.add(1, 10, 20, 1.5).unwrap();
        let list = builder.build().unwrap();
        let text = render_bedgraph(&list, "bins").unwrap();
        assert_eq!(text, "track type=bedGraph name=\"bins\"\nchr2\t10\t20\t1.5\n");
    }
}
