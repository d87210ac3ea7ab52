pub mod markers;
pub mod migrate;
pub mod persist;
pub mod xml;

pub use markers::{decode_intermediate, encode_intermediate};
pub use migrate::{migrate, migration_steps, MigrationStep};
pub use persist::{
    deserialize_script, load_script_file, save_document_file, save_script_file,
    serialize_flat_commands, serialize_script, ExportMode,
};
pub use xml::{parse_xml_document, write_xml_document, XmlDocument, XmlElement, XmlNode};
