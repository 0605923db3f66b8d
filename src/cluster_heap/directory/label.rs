use alloc::string::String;
use core::fmt::Debug;

use super::cursor::Cursor;
use crate::cluster_heap::object::Object;
use crate::codec;
use crate::endian::Little as LE;
use crate::error::{Error, InputError};
use crate::file::Attributes;
use crate::io;
use crate::region::data::entry_type::{EntryType, RawEntryType};
use crate::region::data::short::{CaseFlags, DELETED, DELETED_ESCAPE, ShortEntry};
use crate::region::data::{ENTRY_SIZE, MAX_LABEL_LENGTH, RawEntry, VolumeLabel};
use crate::region::{load, store};
use crate::volume::Volume;

/// Characters a legacy label refuses
const ILLEGAL: &[u8] = b"+.,;=[]/*:<>|\\\"?\x7F";
/// Characters an exFAT label refuses
const ILLEGAL_EXFAT: &[u8] = b"/*:<>|\\\"?\x7F";

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    fn label_type() -> u8 {
        RawEntryType::new(EntryType::VolumeLabel, true).into()
    }

    /// Cursor on the label entry of the root directory, or wherever the search ended
    fn find_label(&mut self) -> Result<(Cursor, Option<RawEntry>), Error<E>> {
        let root = Object::root(self.generation);
        let mut cursor = self.cursor(&root)?;
        loop {
            let raw = self.entry(&cursor)?;
            if raw[0] == 0 {
                return Ok((cursor, None));
            }
            let found = match self.layout.is_exfat() {
                true => raw[0] == Self::label_type(),
                false => {
                    let attributes = raw[11] & 0x3F & !Attributes::ARCHIVE.bits();
                    raw[0] != DELETED && raw[0] != b'.' && attributes == Attributes::VOLUME.bits()
                }
            };
            if found {
                return Ok((cursor, Some(raw)));
            }
            if !self.advance(&mut cursor, false)? {
                return Ok((cursor, None));
            }
        }
    }

    /// Volume label, empty when the volume has none
    pub(crate) fn label(&mut self) -> Result<String, Error<E>> {
        let raw = match self.find_label()? {
            (_, Some(raw)) => raw,
            (_, None) => return Ok(String::new()),
        };
        if self.layout.is_exfat() {
            let label: VolumeLabel = load(&raw);
            let count = (label.character_count as usize).min(MAX_LABEL_LENGTH);
            let units = label.volume_label;
            let units: heapless::Vec<u16, MAX_LABEL_LENGTH> = units[..count].iter().map(|unit| unit.to_ne()).collect();
            return Ok(codec::to_string(&units));
        }
        let end = raw[..11].iter().rposition(|&byte| byte != b' ').map_or(0, |i| i + 1);
        let mut label = String::with_capacity(end);
        for (i, &byte) in raw[..end].iter().enumerate() {
            let byte = if i == 0 && byte == DELETED_ESCAPE { DELETED } else { byte };
            let unit = self.options.codepage.to_unicode(byte);
            label.push(char::from_u32(unit as u32).filter(|&c| c != '\0').unwrap_or('?'));
        }
        Ok(label)
    }

    /// Legacy label in OEM code, space padded, with its length
    fn encode_label(&self, label: &str) -> Result<([u8; 11], usize), InputError> {
        let codepage = self.options.codepage;
        let mut name = [b' '; 11];
        let mut length = 0;
        for unit in label.encode_utf16() {
            let oem = codepage.from_unicode(codepage.to_upper(unit));
            if oem < 0x20 || ILLEGAL.contains(&oem) || length >= name.len() {
                return Err(InputError::InvalidName);
            }
            name[length] = oem;
            length += 1;
        }
        if name[0] == DELETED {
            return Err(InputError::InvalidName);
        }
        while length > 0 && name[length - 1] == b' ' {
            length -= 1;
        }
        Ok((name, length))
    }

    fn encode_exfat_label(&self, label: &str) -> Result<([LE<u16>; MAX_LABEL_LENGTH], usize), InputError> {
        let mut units = [LE::default(); MAX_LABEL_LENGTH];
        let mut length = 0;
        for unit in label.encode_utf16() {
            let illegal = unit < 0x20 || (unit < 0x80 && ILLEGAL_EXFAT.contains(&(unit as u8)));
            if illegal || length >= MAX_LABEL_LENGTH {
                return Err(InputError::InvalidName);
            }
            units[length] = unit.into();
            length += 1;
        }
        Ok((units, length))
    }

    /// Replace the volume label, an empty label removes it
    pub(crate) fn set_label(&mut self, label: &str) -> Result<(), Error<E>> {
        let mut raw: RawEntry = [0; ENTRY_SIZE];
        let length = match self.layout.is_exfat() {
            true => {
                let (units, length) = self.encode_exfat_label(label)?;
                let mut entry = VolumeLabel::default();
                entry.entry_type = RawEntryType::new(EntryType::VolumeLabel, true);
                entry.character_count = length as u8;
                entry.volume_label = units;
                store(&mut raw, &entry);
                length
            }
            false => {
                let (name, length) = self.encode_label(label)?;
                let now = (self.options.clock)().timestamp;
                store(&mut raw, &ShortEntry::new(name, CaseFlags::empty(), Attributes::VOLUME, now));
                length
            }
        };
        match self.find_label()? {
            (cursor, Some(mut existing)) => {
                match (self.layout.is_exfat(), length) {
                    (true, _) => existing = raw,
                    (false, 0) => existing[0] = DELETED,
                    (false, _) => existing[..11].copy_from_slice(&raw[..11]),
                }
                self.put_entry(&cursor, &existing)?;
            }
            (_, None) if length == 0 => {}
            (_, None) => {
                let root = Object::root(self.generation);
                let cursor = self.alloc_entries(&root, 1)?;
                self.put_entry(&cursor, &raw)?;
            }
        }
        debug!("Volume label set to {:?}", label);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::error::{Error, InputError};
    use crate::testing;

    #[test]
    fn test_label() {
        for io in [testing::fat12(), testing::fat32(), testing::exfat()] {
            let mut volume = testing::volume(io);
            assert_eq!(volume.label().unwrap(), "");
            volume.set_label("Backup").unwrap();
            let expected = if volume.layout.is_exfat() { "Backup" } else { "BACKUP" };
            assert_eq!(volume.label().unwrap(), expected);
            volume.set_label("DISK 2").unwrap();
            assert_eq!(volume.label().unwrap(), "DISK 2");
            volume.set_label("").unwrap();
            assert_eq!(volume.label().unwrap(), "");
        }
    }

    #[test]
    fn test_invalid_label() {
        for io in [testing::fat16(), testing::exfat()] {
            let mut volume = testing::volume(io);
            let result = volume.set_label("twelve chars");
            assert!(matches!(result, Err(Error::Input(InputError::InvalidName))));
            let result = volume.set_label("a*b");
            assert!(matches!(result, Err(Error::Input(InputError::InvalidName))));
        }
        let mut volume = testing::volume(testing::fat16());
        assert!(matches!(volume.set_label("v1.0"), Err(Error::Input(InputError::InvalidName))));
    }
}
