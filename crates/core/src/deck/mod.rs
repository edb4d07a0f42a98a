//! Deck Assembly
//!
//! Turns a [`SlidePlan`] into a `.pptx` file: a title slide followed by one
//! content slide per plan entry, text on the left and the illustration (if
//! any) on the right.

pub mod package;

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::error::Result;
use crate::slide::SlidePlan;
use package::{Font, Frame, Shape, SlidePart, inches};

pub const DEFAULT_OUTPUT_DIR: &str = "powerpoint-ppt";
pub const DECK_EXTENSION: &str = "pptx";
pub const SUBTITLE: &str = "AI Version";

const BACKGROUND: [u8; 3] = [149, 104, 227];
const TITLE_FONT: Font = Font {
    size: 3000,
    bold: true,
};
const CONTENT_FONT: Font = Font {
    size: 1600,
    bold: false,
};

/// Writes decks into a fixed output directory.
#[derive(Debug, Clone)]
pub struct DeckAssembler {
    output_dir: PathBuf,
}

impl DeckAssembler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Where the deck for `topic` is written. The topic is used verbatim.
    pub fn deck_path(&self, topic: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", topic, DECK_EXTENSION))
    }

    /// Renders `plan` and writes it, replacing any deck with the same topic.
    pub fn assemble(&self, topic: &str, plan: &SlidePlan) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.deck_path(topic);

        let mut slides = vec![title_slide(topic)];
        let mut media = Vec::new();
        for entry in plan.iter() {
            let image_name = entry.image.as_ref().map(|image| {
                let name = format!("image{}.png", media.len() + 1);
                media.push((name.clone(), &image.png));
                name
            });
            slides.push(content_slide(&entry.title, &entry.body, image_name));
        }

        let mut zip = ZipWriter::new(File::create(&path)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut put = |name: &str, bytes: &[u8]| -> Result<()> {
            zip.start_file(name, options)?;
            zip.write_all(bytes)?;
            Ok(())
        };

        put("[Content_Types].xml", package::content_types(slides.len()).as_bytes())?;
        put("_rels/.rels", package::root_rels().as_bytes())?;
        put("docProps/core.xml", package::core_props(topic).as_bytes())?;
        put("docProps/app.xml", package::app_props(slides.len()).as_bytes())?;
        put("ppt/presentation.xml", package::presentation(slides.len()).as_bytes())?;
        put(
            "ppt/_rels/presentation.xml.rels",
            package::presentation_rels(slides.len()).as_bytes(),
        )?;
        put("ppt/slideMasters/slideMaster1.xml", package::slide_master().as_bytes())?;
        put(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            package::slide_master_rels().as_bytes(),
        )?;
        put("ppt/slideLayouts/slideLayout1.xml", package::slide_layout().as_bytes())?;
        put(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            package::slide_layout_rels().as_bytes(),
        )?;
        put("ppt/theme/theme1.xml", package::theme().as_bytes())?;
        for (i, slide) in slides.iter().enumerate() {
            let n = i + 1;
            put(&format!("ppt/slides/slide{n}.xml"), package::slide(slide).as_bytes())?;
            put(
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                package::slide_rels(slide).as_bytes(),
            )?;
        }
        for (name, png) in &media {
            put(&format!("ppt/media/{name}"), png)?;
        }
        zip.finish()?;

        info!(path = %path.display(), slides = slides.len(), images = media.len(), "Deck written");
        Ok(path)
    }
}

fn title_slide(topic: &str) -> SlidePart {
    SlidePart {
        background: BACKGROUND,
        shapes: vec![
            Shape::Text {
                frame: Frame {
                    x: inches(0.75),
                    y: inches(2.13),
                    cx: inches(8.5),
                    cy: inches(1.47),
                },
                font: TITLE_FONT,
                text: topic.to_string(),
                centered: true,
            },
            Shape::Text {
                frame: Frame {
                    x: inches(1.5),
                    y: inches(3.9),
                    cx: inches(7.0),
                    cy: inches(1.75),
                },
                font: CONTENT_FONT,
                text: SUBTITLE.to_string(),
                centered: true,
            },
        ],
        media: None,
    }
}

fn content_slide(title: &str, body: &str, image: Option<String>) -> SlidePart {
    let mut shapes = vec![
        Shape::Text {
            frame: Frame {
                x: inches(0.5),
                y: inches(0.3),
                cx: inches(9.0),
                cy: inches(1.25),
            },
            font: TITLE_FONT,
            text: title.to_string(),
            centered: true,
        },
        Shape::Text {
            frame: Frame {
                x: inches(1.0),
                y: inches(2.3),
                cx: inches(4.0),
                cy: inches(5.0),
            },
            font: CONTENT_FONT,
            text: body.to_string(),
            centered: false,
        },
    ];
    if image.is_some() {
        shapes.push(Shape::Picture {
            frame: Frame {
                x: inches(5.0),
                y: inches(2.1),
                cx: inches(4.5),
                cy: inches(4.5),
            },
            rel_id: "rId2".to_string(),
        });
    }
    SlidePart {
        background: BACKGROUND,
        shapes,
        media: image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::illustration::decode_to_png;
    use crate::slide::{SlideEntry, SlideImage};
    use std::io::Read;
    use zip::ZipArchive;

    fn tiny_image() -> SlideImage {
        let raster = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(raster)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        decode_to_png(&bytes).unwrap()
    }

    fn entry(title: &str, image: Option<SlideImage>) -> SlideEntry {
        SlideEntry {
            title: title.to_string(),
            body: format!("About {}.", title),
            image,
        }
    }

    fn read_part(archive: &mut ZipArchive<File>, name: &str) -> String {
        let mut xml = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut xml).unwrap();
        xml
    }

    fn slide_parts(archive: &ZipArchive<File>) -> usize {
        archive
            .file_names()
            .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
            .count()
    }

    #[test]
    fn test_assemble_writes_title_slide_then_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = DeckAssembler::new(dir.path().join("out"));
        let plan = SlidePlan::from(vec![
            entry("Testing Basics", Some(tiny_image())),
            entry("Test Coverage", None),
            entry("Conclusion", Some(tiny_image())),
        ]);

        let path = assembler.assemble("Testing", &plan).unwrap();
        assert_eq!(path, dir.path().join("out").join("Testing.pptx"));

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(slide_parts(&archive), 4);

        let title = read_part(&mut archive, "ppt/slides/slide1.xml");
        assert!(title.contains("<a:t>Testing</a:t>"));
        assert!(title.contains(SUBTITLE));

        for (n, name) in ["Testing Basics", "Test Coverage", "Conclusion"]
            .iter()
            .enumerate()
        {
            let xml = read_part(&mut archive, &format!("ppt/slides/slide{}.xml", n + 2));
            assert!(xml.contains(&format!("<a:t>{}</a:t>", name)));
        }
    }

    #[test]
    fn test_missing_image_omits_picture() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = DeckAssembler::new(dir.path());
        let plan = SlidePlan::from(vec![entry("With", Some(tiny_image())), entry("Without", None)]);

        let path = assembler.assemble("Pictures", &plan).unwrap();
        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();

        assert!(read_part(&mut archive, "ppt/slides/slide2.xml").contains("<p:pic>"));
        assert!(!read_part(&mut archive, "ppt/slides/slide3.xml").contains("<p:pic>"));
        assert!(
            !read_part(&mut archive, "ppt/slides/_rels/slide3.xml.rels").contains("media/")
        );
        assert!(archive.by_name("ppt/media/image1.png").is_ok());
        assert!(archive.by_name("ppt/media/image2.png").is_err());
    }

    #[test]
    fn test_empty_plan_yields_title_slide_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = DeckAssembler::new(dir.path())
            .assemble("Lonely", &SlidePlan::default())
            .unwrap();
        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(slide_parts(&archive), 1);
    }

    #[test]
    fn test_assembling_twice_overwrites_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = DeckAssembler::new(dir.path());

        let first = assembler
            .assemble("Repeat", &SlidePlan::from(vec![entry("One", None), entry("Two", None)]))
            .unwrap();
        let second = assembler
            .assemble("Repeat", &SlidePlan::from(vec![entry("Only", None)]))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        let archive = ZipArchive::new(File::open(&second).unwrap()).unwrap();
        assert_eq!(slide_parts(&archive), 2);
    }

    #[test]
    fn test_output_dir_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("decks");
        let assembler = DeckAssembler::new(&out);
        assembler.assemble("A", &SlidePlan::default()).unwrap();
        assembler.assemble("B", &SlidePlan::default()).unwrap();
        assert!(out.join("A.pptx").exists() && out.join("B.pptx").exists());
    }
}
