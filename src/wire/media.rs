//! Media-controller UAPI: entity/link enumeration and link setup.

use super::iowr;

/// OR-ed into an entity id to request the next entity in the enumeration.
pub(crate) const MEDIA_ENT_ID_FLAG_NEXT: u32 = 1 << 31;

/// Entity type for a V4L2 video device node.
pub(crate) const MEDIA_ENT_T_DEVNODE_V4L: u32 = 0x0001_0001;
/// Entity type for a V4L2 sub-device.
pub(crate) const MEDIA_ENT_T_V4L2_SUBDEV: u32 = 0x0002_0001;

pub(crate) const MEDIA_PAD_FL_SINK: u32 = 1;
pub(crate) const MEDIA_PAD_FL_SOURCE: u32 = 2;

pub(crate) const MEDIA_LNK_FL_ENABLED: u32 = 1;
pub(crate) const MEDIA_LNK_FL_IMMUTABLE: u32 = 2;

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct MediaDeviceInfo {
    pub driver: [u8; 16],
    pub model: [u8; 32],
    pub serial: [u8; 40],
    pub bus_info: [u8; 32],
    pub media_version: u32,
    pub hw_revision: u32,
    pub driver_version: u32,
    pub reserved: [u32; 31],
}

impl MediaDeviceInfo {
    pub(crate) const fn zeroed() -> Self {
        Self {
            driver: [0; 16],
            model: [0; 32],
            serial: [0; 40],
            bus_info: [0; 32],
            media_version: 0,
            hw_revision: 0,
            driver_version: 0,
            reserved: [0; 31],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct MediaEntityDesc {
    pub id: u32,
    pub name: [u8; 32],
    pub typ: u32,
    pub revision: u32,
    pub flags: u32,
    pub group_id: u32,
    pub pads: u16,
    pub links: u16,
    pub reserved: [u32; 4],
    // Union tail. For device-node entities the first two words carry the
    // character device major/minor numbers.
    pub dev_major: u32,
    pub dev_minor: u32,
    pub raw: [u8; 176],
}

impl MediaEntityDesc {
    pub(crate) const fn zeroed() -> Self {
        Self {
            id: 0,
            name: [0; 32],
            typ: 0,
            revision: 0,
            flags: 0,
            group_id: 0,
            pads: 0,
            links: 0,
            reserved: [0; 4],
            dev_major: 0,
            dev_minor: 0,
            raw: [0; 176],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct MediaPadDesc {
    pub entity: u32,
    pub index: u16,
    pub _pad: u16,
    pub flags: u32,
    pub reserved: [u32; 2],
}

impl MediaPadDesc {
    pub(crate) const fn zeroed() -> Self {
        Self {
            entity: 0,
            index: 0,
            _pad: 0,
            flags: 0,
            reserved: [0; 2],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct MediaLinkDesc {
    pub source: MediaPadDesc,
    pub sink: MediaPadDesc,
    pub flags: u32,
    pub reserved: [u32; 2],
}

impl MediaLinkDesc {
    pub(crate) const fn zeroed() -> Self {
        Self {
            source: MediaPadDesc::zeroed(),
            sink: MediaPadDesc::zeroed(),
            flags: 0,
            reserved: [0; 2],
        }
    }
}

// 64-bit layout: the pointer members force 8-byte alignment, leaving a hole
// after `entity`.
#[repr(C)]
pub(crate) struct MediaLinksEnum {
    pub entity: u32,
    pub _pad: u32,
    pub pads: *mut MediaPadDesc,
    pub links: *mut MediaLinkDesc,
    pub reserved: [u32; 4],
}

pub(crate) const MEDIA_IOC_DEVICE_INFO: u32 = iowr::<MediaDeviceInfo>(b'|', 0);
pub(crate) const MEDIA_IOC_ENUM_ENTITIES: u32 = iowr::<MediaEntityDesc>(b'|', 1);
pub(crate) const MEDIA_IOC_ENUM_LINKS: u32 = iowr::<MediaLinksEnum>(b'|', 2);
pub(crate) const MEDIA_IOC_SETUP_LINK: u32 = iowr::<MediaLinkDesc>(b'|', 3);
