//! Kernel-backed [`MediaBus`] speaking real `ioctl`s to device nodes.
#![allow(unsafe_code)]

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::foundation::error::{PlaneweaveError, PlaneweaveResult};
use crate::foundation::geom::Rect;
use crate::wire::{fixed_string, media, video};

use super::{
    DeviceInfo, EntityInfo, EntityKind, LinkInfo, MediaBus, NodeCaps, NodeHandle, PadFormat,
    PadRef, PixFormat, QueuedPlane, SelectionTarget, StreamDirection,
};

/// [`MediaBus`] implementation over an opened media device.
///
/// Node handles index a table of file descriptors owned by the bus; all
/// descriptors are closed when the bus drops. dmabuf descriptors passed in
/// buffers are borrowed, never closed.
pub struct KernelBus {
    media: OwnedFd,
    nodes: Vec<OwnedFd>,
}

impl KernelBus {
    /// Opens a media controller device, for example `/dev/media0`.
    pub fn open(path: &Path) -> PlaneweaveResult<Self> {
        let media = open_cloexec(path)?;
        Ok(Self {
            media,
            nodes: Vec::new(),
        })
    }

    fn node_fd(&self, node: NodeHandle) -> PlaneweaveResult<RawFd> {
        self.nodes
            .get(node.index())
            .map(AsRawFd::as_raw_fd)
            .ok_or_else(|| PlaneweaveError::validation("stale device node handle"))
    }
}

fn open_cloexec(path: &Path) -> PlaneweaveResult<OwnedFd> {
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        PlaneweaveError::validation(format!("device path contains NUL: {}", path.display()))
    })?;
    // SAFETY: plain open(2) with a valid NUL-terminated path.
    let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(PlaneweaveError::device("open", io::Error::last_os_error()));
    }
    // SAFETY: the descriptor was just returned by open(2) and has no other
    // owner.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn ioctl_raw<T>(fd: RawFd, request: u32, arg: &mut T) -> io::Result<()> {
    // SAFETY: request codes and argument types are matched pairs from the
    // wire tables, and `arg` is a fully initialized repr(C) struct.
    let ret = unsafe { libc::ioctl(fd, request as libc::c_ulong, arg as *mut T) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn ioctl<T>(fd: RawFd, request: u32, arg: &mut T, op: &'static str) -> PlaneweaveResult<()> {
    ioctl_raw(fd, request, arg).map_err(|err| PlaneweaveError::device(op, err))
}

fn entity_from_desc(desc: &media::MediaEntityDesc) -> EntityInfo {
    let kind = match desc.typ {
        media::MEDIA_ENT_T_DEVNODE_V4L => EntityKind::VideoNode,
        media::MEDIA_ENT_T_V4L2_SUBDEV => EntityKind::Subdev,
        _ => EntityKind::Other,
    };
    let dev = match kind {
        EntityKind::Other => None,
        _ if desc.dev_major == 0 && desc.dev_minor == 0 => None,
        _ => Some((desc.dev_major, desc.dev_minor)),
    };
    EntityInfo {
        id: desc.id,
        name: fixed_string(&desc.name),
        kind,
        dev,
        pads: desc.pads,
        links: desc.links,
    }
}

impl MediaBus for KernelBus {
    fn device_info(&mut self) -> PlaneweaveResult<DeviceInfo> {
        let mut info = media::MediaDeviceInfo::zeroed();
        ioctl(
            self.media.as_raw_fd(),
            media::MEDIA_IOC_DEVICE_INFO,
            &mut info,
            "device info",
        )?;
        Ok(DeviceInfo {
            driver: fixed_string(&info.driver),
            model: fixed_string(&info.model),
            serial: fixed_string(&info.serial),
            bus_info: fixed_string(&info.bus_info),
            media_version: info.media_version,
        })
    }

    fn next_entity(&mut self, after: Option<u32>) -> PlaneweaveResult<Option<EntityInfo>> {
        let mut desc = media::MediaEntityDesc::zeroed();
        desc.id = after.unwrap_or(0) | media::MEDIA_ENT_ID_FLAG_NEXT;
        match ioctl_raw(
            self.media.as_raw_fd(),
            media::MEDIA_IOC_ENUM_ENTITIES,
            &mut desc,
        ) {
            Ok(()) => Ok(Some(entity_from_desc(&desc))),
            // The enumeration past the last entity fails with EINVAL.
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => Ok(None),
            Err(err) => Err(PlaneweaveError::device("enum entities", err)),
        }
    }

    fn entity_links(&mut self, entity: &EntityInfo) -> PlaneweaveResult<Vec<LinkInfo>> {
        if entity.links == 0 {
            return Ok(Vec::new());
        }
        let mut links = vec![media::MediaLinkDesc::zeroed(); usize::from(entity.links)];
        let mut arg = media::MediaLinksEnum {
            entity: entity.id,
            _pad: 0,
            pads: std::ptr::null_mut(),
            links: links.as_mut_ptr(),
            reserved: [0; 4],
        };
        ioctl(
            self.media.as_raw_fd(),
            media::MEDIA_IOC_ENUM_LINKS,
            &mut arg,
            "enum links",
        )?;
        Ok(links
            .iter()
            .map(|desc| LinkInfo {
                source: PadRef {
                    entity: desc.source.entity,
                    index: desc.source.index,
                },
                sink: PadRef {
                    entity: desc.sink.entity,
                    index: desc.sink.index,
                },
                enabled: desc.flags & media::MEDIA_LNK_FL_ENABLED != 0,
                immutable: desc.flags & media::MEDIA_LNK_FL_IMMUTABLE != 0,
            })
            .collect())
    }

    fn setup_link(&mut self, link: &LinkInfo) -> PlaneweaveResult<()> {
        let mut desc = media::MediaLinkDesc::zeroed();
        desc.source.entity = link.source.entity;
        desc.source.index = link.source.index;
        desc.source.flags = media::MEDIA_PAD_FL_SOURCE;
        desc.sink.entity = link.sink.entity;
        desc.sink.index = link.sink.index;
        desc.sink.flags = media::MEDIA_PAD_FL_SINK;
        if link.enabled {
            desc.flags |= media::MEDIA_LNK_FL_ENABLED;
        }
        if link.immutable {
            desc.flags |= media::MEDIA_LNK_FL_IMMUTABLE;
        }
        ioctl(
            self.media.as_raw_fd(),
            media::MEDIA_IOC_SETUP_LINK,
            &mut desc,
            "setup link",
        )
    }

    fn open_node(&mut self, entity: &EntityInfo) -> PlaneweaveResult<NodeHandle> {
        let (major, minor) = entity.dev.ok_or_else(|| {
            PlaneweaveError::topology(format!("entity `{}` has no device node", entity.name))
        })?;
        let path = PathBuf::from(format!("/dev/char/{major}:{minor}"));
        let fd = open_cloexec(&path)?;
        self.nodes.push(fd);
        Ok(NodeHandle::new((self.nodes.len() - 1) as u32))
    }

    fn node_capabilities(&mut self, node: NodeHandle) -> PlaneweaveResult<NodeCaps> {
        let fd = self.node_fd(node)?;
        let mut cap = video::V4l2Capability::zeroed();
        ioctl(fd, video::VIDIOC_QUERYCAP, &mut cap, "query capabilities")?;
        let capabilities = if cap.device_caps != 0 {
            cap.device_caps
        } else {
            cap.capabilities
        };
        Ok(NodeCaps { capabilities })
    }

    fn set_pix_format(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        fmt: &PixFormat,
    ) -> PlaneweaveResult<()> {
        let fd = self.node_fd(node)?;
        let mut arg = video::V4l2Format::zeroed();
        arg.typ = dir.buf_type();
        arg.pix_mp.width = fmt.width;
        arg.pix_mp.height = fmt.height;
        arg.pix_mp.pixelformat = fmt.fourcc;
        arg.pix_mp.field = video::V4L2_FIELD_ANY;
        arg.pix_mp.num_planes = fmt.num_planes as u8;
        if fmt.premul {
            arg.pix_mp.flags = video::V4L2_PIX_FMT_FLAG_PREMUL_ALPHA as u8;
        }
        for (plane, stride) in arg
            .pix_mp
            .plane_fmt
            .iter_mut()
            .zip(fmt.strides.iter().take(fmt.num_planes))
        {
            plane.bytesperline = *stride;
        }
        ioctl(fd, video::VIDIOC_S_FMT, &mut arg, "set format")
    }

    fn request_buffers(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        count: u32,
    ) -> PlaneweaveResult<()> {
        let fd = self.node_fd(node)?;
        let mut arg = video::V4l2RequestBuffers::zeroed();
        arg.count = count;
        arg.typ = dir.buf_type();
        arg.memory = video::V4L2_MEMORY_DMABUF;
        ioctl(fd, video::VIDIOC_REQBUFS, &mut arg, "request buffers")
    }

    fn queue_buffer(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        planes: &[QueuedPlane],
    ) -> PlaneweaveResult<()> {
        let fd = self.node_fd(node)?;
        let mut wire_planes = [video::V4l2Plane::zeroed(); video::VIDEO_MAX_PLANES];
        for (wire_plane, plane) in wire_planes.iter_mut().zip(planes) {
            wire_plane.m = u64::from(plane.fd as u32);
            wire_plane.length = plane.length;
            wire_plane.bytesused = plane.length;
        }
        let mut buf = video::V4l2Buffer::zeroed();
        buf.typ = dir.buf_type();
        buf.memory = video::V4L2_MEMORY_DMABUF;
        buf.m = wire_planes.as_mut_ptr() as usize as u64;
        buf.length = planes.len().min(video::VIDEO_MAX_PLANES) as u32;
        ioctl(fd, video::VIDIOC_QBUF, &mut buf, "queue buffer")
    }

    fn dequeue_buffer(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()> {
        let fd = self.node_fd(node)?;
        let mut wire_planes = [video::V4l2Plane::zeroed(); video::VIDEO_MAX_PLANES];
        let mut buf = video::V4l2Buffer::zeroed();
        buf.typ = dir.buf_type();
        buf.memory = video::V4L2_MEMORY_DMABUF;
        buf.m = wire_planes.as_mut_ptr() as usize as u64;
        buf.length = 1;
        ioctl(fd, video::VIDIOC_DQBUF, &mut buf, "dequeue buffer")
    }

    fn stream_on(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()> {
        let fd = self.node_fd(node)?;
        let mut typ = dir.buf_type();
        ioctl(fd, video::VIDIOC_STREAMON, &mut typ, "stream on")
    }

    fn stream_off(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()> {
        let fd = self.node_fd(node)?;
        let mut typ = dir.buf_type();
        ioctl(fd, video::VIDIOC_STREAMOFF, &mut typ, "stream off")
    }

    fn set_subdev_format(
        &mut self,
        node: NodeHandle,
        pad: u32,
        fmt: &PadFormat,
    ) -> PlaneweaveResult<PadFormat> {
        let fd = self.node_fd(node)?;
        let mut arg = video::V4l2SubdevFormat::zeroed();
        arg.which = video::V4L2_SUBDEV_FORMAT_ACTIVE;
        arg.pad = pad;
        arg.format.width = fmt.width;
        arg.format.height = fmt.height;
        arg.format.code = fmt.code;
        ioctl(fd, video::VIDIOC_SUBDEV_S_FMT, &mut arg, "set pad format")?;
        Ok(PadFormat {
            width: arg.format.width,
            height: arg.format.height,
            code: arg.format.code,
        })
    }

    fn set_subdev_selection(
        &mut self,
        node: NodeHandle,
        pad: u32,
        target: SelectionTarget,
        rect: Rect,
    ) -> PlaneweaveResult<Rect> {
        let fd = self.node_fd(node)?;
        let mut arg = video::V4l2SubdevSelection::zeroed();
        arg.which = video::V4L2_SUBDEV_FORMAT_ACTIVE;
        arg.pad = pad;
        arg.target = target.wire_target();
        arg.r = video::V4l2Rect {
            left: rect.left,
            top: rect.top,
            width: rect.width,
            height: rect.height,
        };
        ioctl(fd, video::VIDIOC_SUBDEV_S_SELECTION, &mut arg, "set selection")?;
        Ok(Rect {
            left: arg.r.left,
            top: arg.r.top,
            width: arg.r.width,
            height: arg.r.height,
        })
    }

    fn set_control(&mut self, node: NodeHandle, ctrl: u32, value: i32) -> PlaneweaveResult<()> {
        let fd = self.node_fd(node)?;
        let mut arg = video::V4l2Control { id: ctrl, value };
        ioctl(fd, video::VIDIOC_S_CTRL, &mut arg, "set control")
    }
}
