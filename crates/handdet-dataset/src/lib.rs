pub mod categories;
pub mod coco;
pub mod convert;
pub mod inspect;
pub mod layout;
pub mod yolo;

pub use categories::CategoryMap;
pub use coco::{CocoAnnotation, CocoCategory, CocoDataset, CocoImage};
pub use convert::{convert_coco_to_yolo, convert_dataset, ConversionReport, ConvertOptions, LabelSet};
pub use inspect::{inspect_dataset, DatasetReport};
pub use layout::{prepare_dataset, write_dataset_yaml, DatasetLayout, DatasetYaml, PrepareReport};
pub use yolo::{label_file_name, YoloLabel};
