use std::{
	fs::{File, OpenOptions},
	io::{self, Read, Seek, SeekFrom, Write},
	path::Path,
};

use crate::{
	error::MapError,
	geometry::{Box2i, Vector2i},
	quadtree::{self, align_out, next_branch_disp, next_branch_idx, Info, WriteMode},
	stream::{BoxIntersectable, TileIStream},
	tile::{tile_area_minis, PlainTile},
};

const HEADER_SIZE: u32 = 32;

struct Header {
	depth: u32,
	origin: Vector2i,
	log2_tile_w: u32,
	root: u32,
	size: u32,
}

impl Header {
	fn encode(&self) -> [u8; 32] {
		let mut buf = [0u8; 32];
		buf[0..4].copy_from_slice(&self.depth.to_le_bytes());
		buf[4..12].copy_from_slice(&self.origin.x.to_le_bytes());
		buf[12..20].copy_from_slice(&self.origin.y.to_le_bytes());
		buf[20..24].copy_from_slice(&self.log2_tile_w.to_le_bytes());
		buf[24..28].copy_from_slice(&self.root.to_le_bytes());
		buf[28..32].copy_from_slice(&self.size.to_le_bytes());
		buf
	}

	fn decode(buf: &[u8; 32]) -> Header {
		Header {
			depth: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
			origin: Vector2i::new(i64::from_le_bytes(buf[4..12].try_into().unwrap()), i64::from_le_bytes(buf[12..20].try_into().unwrap())),
			log2_tile_w: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
			root: u32::from_le_bytes(buf[24..28].try_into().unwrap()),
			size: u32::from_le_bytes(buf[28..32].try_into().unwrap()),
		}
	}
}

/// A lazily-populated mirror of one node's position in the file. `children`
/// starts all-`Unknown`; the first descent through a branch reads its four
/// offsets in one I/O and fixes each child to `Absent` or `Present`.
struct IndexNode {
	pos: u32,
	children: [ChildSlot; 4],
}

impl IndexNode {
	fn new(pos: u32) -> Self { IndexNode { pos, children: [ChildSlot::Unknown, ChildSlot::Unknown, ChildSlot::Unknown, ChildSlot::Unknown] } }
}

enum ChildSlot {
	Unknown,
	Absent,
	Present(Box<IndexNode>),
}

fn ensure_populated(file: &mut File, node: &mut IndexNode) -> io::Result<()> {
	if !matches!(node.children[0], ChildSlot::Unknown) {
		return Ok(());
	}
	let mut buf = [0u8; 16];
	file.seek(SeekFrom::Start(node.pos as u64))?;
	file.read_exact(&mut buf)?;
	for i in 0..4 {
		let offset = u32::from_le_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
		node.children[i] = if offset == 0 { ChildSlot::Absent } else { ChildSlot::Present(Box::new(IndexNode::new(offset))) };
	}
	Ok(())
}

/// Descends toward `p`, allocating (appending) empty intermediate branches
/// and a zeroed leaf as needed, patching the single branch slot that used to
/// be absent. Storage-agnostic in the same sense as `quadtree::alloc_mut`:
/// it only ever touches the file, the append cursor, the dirty flag, and the
/// slot it's given.
fn alloc_slot(
	file: &mut File, size: &mut u32, dirty: &mut bool, slot: &mut ChildSlot, info: Info, p: Vector2i, depth: u32, log2_tile_w: u32,
) -> io::Result<(u32, Info)> {
	if matches!(slot, ChildSlot::Unknown | ChildSlot::Absent) {
		let pos = *size;
		file.seek(SeekFrom::Start(pos as u64))?;
		if info.depth == 0 {
			file.write_all(&vec![0u8; tile_area_minis(log2_tile_w) * 8])?;
			*size += (tile_area_minis(log2_tile_w) * 8) as u32;
		} else {
			file.write_all(&[0u8; 16])?;
			*size += 16;
		}
		*dirty = true;
		*slot = ChildSlot::Present(Box::new(IndexNode::new(pos)));
	}
	let node = match slot {
		ChildSlot::Present(n) => n,
		_ => unreachable!("just-allocated slot is always Present"),
	};
	if info.depth == depth {
		return Ok((node.pos, info));
	}
	ensure_populated(file, node)?;
	let hwidth = 1i64 << (info.depth - 1 + log2_tile_w);
	let idx = next_branch_idx(info.origin, p, hwidth);
	let next_info = Info::new(info.origin + next_branch_disp(idx, hwidth), info.depth - 1);
	let child_missing = matches!(node.children[idx], ChildSlot::Unknown | ChildSlot::Absent);
	let branch_pos = node.pos;
	let (child_pos, final_info) = alloc_slot(file, size, dirty, &mut node.children[idx], next_info, p, depth, log2_tile_w)?;
	if child_missing {
		file.seek(SeekFrom::Start((branch_pos + idx as u32 * 4) as u64))?;
		file.write_all(&child_pos.to_le_bytes())?;
	}
	Ok((child_pos, final_info))
}

/// Read-only counterpart of [`alloc_slot`]: never writes, returns `None` on
/// a miss instead of allocating.
fn seek_slot(file: &mut File, slot: &mut ChildSlot, info: Info, p: Vector2i, min_depth: u32, log2_tile_w: u32) -> io::Result<Option<(u32, Info)>> {
	let node = match slot {
		ChildSlot::Present(n) => n,
		ChildSlot::Absent | ChildSlot::Unknown => return Ok(None),
	};
	if info.depth <= min_depth {
		return Ok(Some((node.pos, info)));
	}
	ensure_populated(file, node)?;
	let hwidth = 1i64 << (info.depth - 1 + log2_tile_w);
	let idx = next_branch_idx(info.origin, p, hwidth);
	let next_info = Info::new(info.origin + next_branch_disp(idx, hwidth), info.depth - 1);
	seek_slot(file, &mut node.children[idx], next_info, p, min_depth, log2_tile_w)
}

fn locate_mut<'m>(root: &'m mut ChildSlot, path: &[u8]) -> &'m mut IndexNode {
	let mut slot = root;
	for &idx in path {
		slot = match slot {
			ChildSlot::Present(n) => &mut n.children[idx as usize],
			_ => unreachable!("path only ever follows nodes this walker already populated"),
		};
	}
	match slot {
		ChildSlot::Present(n) => n,
		_ => unreachable!("path only ever follows nodes this walker already populated"),
	}
}

/// File-backed occupancy map. Growth is append-only plus single-slot branch
/// overwrites (a parent's pointer to a child it just allocated); the header
/// is kept in memory and rewritten lazily, on `flush()` or drop.
pub struct PersistentMap {
	file: File,
	header: Header,
	header_dirty: bool,
	index_root: ChildSlot,
	log2_tile_w: u32,
	write_mode: WriteMode,
}

impl PersistentMap {
	pub fn open(path: &Path, origin: Vector2i, log2_tile_w: u32) -> Result<Self, MapError> {
		tracy::zone!("PersistentMap::open");
		let mut file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
		let len = file.metadata()?.len();
		let (header, index_root) = if len == 0 {
			log::debug!("creating new occupancy map at {:?}", path);
			let header = Header { depth: 1, origin, log2_tile_w, root: 0, size: HEADER_SIZE };
			file.seek(SeekFrom::Start(0))?;
			file.write_all(&header.encode())?;
			(header, ChildSlot::Absent)
		} else {
			if len < HEADER_SIZE as u64 {
				log::warn!("rejecting occupancy map {:?}: file shorter than header", path);
				return Err(MapError::BadFormat);
			}
			let mut buf = [0u8; 32];
			file.seek(SeekFrom::Start(0))?;
			file.read_exact(&mut buf)?;
			let header = Header::decode(&buf);
			if header.log2_tile_w != log2_tile_w || header.size < HEADER_SIZE {
				log::warn!("rejecting occupancy map {:?}: tile width mismatch or truncated header", path);
				return Err(MapError::BadFormat);
			}
			let root = if header.root == 0 { ChildSlot::Absent } else { ChildSlot::Present(Box::new(IndexNode::new(header.root))) };
			(header, root)
		};
		Ok(PersistentMap { file, header, header_dirty: false, index_root, log2_tile_w, write_mode: WriteMode::Overwrite })
	}

	pub fn write_mode(&self) -> WriteMode { self.write_mode }

	pub fn set_write_mode(&mut self, mode: WriteMode) { self.write_mode = mode; }

	pub fn get_bounds(&self) -> Box2i { self.root_info().bounds(self.log2_tile_w) }

	fn root_info(&self) -> Info { Info::new(self.header.origin, self.header.depth) }

	fn leaf_byte_len(&self) -> usize { tile_area_minis(self.log2_tile_w) * 8 }

	fn encode_tile(tile: &PlainTile) -> Vec<u8> {
		let mut buf = Vec::with_capacity(tile.minis().len() * 8);
		for m in tile.minis() {
			buf.extend_from_slice(&m.to_le_bytes());
		}
		buf
	}

	fn read_leaf_at(&mut self, pos: u32) -> io::Result<PlainTile> {
		tracy::zone!("PersistentMap::read_leaf_at");
		let mut buf = vec![0u8; self.leaf_byte_len()];
		self.file.seek(SeekFrom::Start(pos as u64))?;
		self.file.read_exact(&mut buf)?;
		let minis = buf.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect();
		Ok(PlainTile::from_minis(minis))
	}

	fn write_leaf_at(&mut self, pos: u32, tile: &PlainTile) -> io::Result<()> {
		tracy::zone!("PersistentMap::write_leaf_at");
		self.file.seek(SeekFrom::Start(pos as u64))?;
		self.file.write_all(&Self::encode_tile(tile))
	}

	fn append_branch_with(&mut self, offsets: [u32; 4]) -> io::Result<u32> {
		let pos = self.header.size;
		let mut buf = [0u8; 16];
		for i in 0..4 {
			buf[i * 4..i * 4 + 4].copy_from_slice(&offsets[i].to_le_bytes());
		}
		self.file.seek(SeekFrom::Start(pos as u64))?;
		self.file.write_all(&buf)?;
		self.header.size += 16;
		self.header_dirty = true;
		Ok(pos)
	}

	fn alloc_item_at_depth(&mut self, p: Vector2i, depth: u32) -> Result<(u32, Info), MapError> {
		let root_info = self.root_info();
		let root_was_absent = matches!(self.index_root, ChildSlot::Absent);
		let (pos, info) =
			alloc_slot(&mut self.file, &mut self.header.size, &mut self.header_dirty, &mut self.index_root, root_info, p, depth, self.log2_tile_w)?;
		if root_was_absent {
			// `alloc_slot` returns the position of the item at `depth`, not
			// the root slot it started from (they coincide only when
			// `depth == root_info.depth`). The root's own file position is
			// whatever `alloc_slot` just allocated `index_root` to be.
			let root_pos = match &self.index_root {
				ChildSlot::Present(node) => node.pos,
				_ => unreachable!("alloc_slot always leaves the slot it's given Present"),
			};
			self.header.root = root_pos;
			self.header_dirty = true;
		}
		Ok((pos, info))
	}

	/// Doubles the tree's side, writing a fresh root record at end-of-file
	/// whose only non-zero offset is the old root, placed at the corner
	/// opposite `direction`.
	fn stretch(&mut self, direction: Vector2i) -> io::Result<()> {
		tracy::zone!("PersistentMap::stretch");
		let init_width = 1i64 << (self.header.depth + self.log2_tile_w);
		let old_root_index = ((direction.x < 0) as usize) | (((direction.y < 0) as usize) << 1);
		let mut offsets = [0u32; 4];
		offsets[old_root_index] = self.header.root;
		let new_pos = self.append_branch_with(offsets)?;

		let old_root = std::mem::replace(&mut self.index_root, ChildSlot::Absent);
		let mut children = [ChildSlot::Absent, ChildSlot::Absent, ChildSlot::Absent, ChildSlot::Absent];
		children[old_root_index] = old_root;
		self.index_root = ChildSlot::Present(Box::new(IndexNode { pos: new_pos, children }));

		self.header.depth += 1;
		let shift = Vector2i::new((direction.x < 0) as i64, (direction.y < 0) as i64) * init_width;
		self.header.origin -= shift;
		self.header.root = new_pos;
		self.header_dirty = true;
		log::debug!("stretched occupancy map to depth {}", self.header.depth);
		Ok(())
	}

	fn fit_point(&mut self, p: Vector2i) -> Result<(), MapError> {
		while !self.root_info().bounds(self.log2_tile_w).contains_point(p) {
			let center = self.root_info().bounds(self.log2_tile_w).center();
			self.stretch(p - center)?;
		}
		Ok(())
	}

	fn fit_box(&mut self, b: Box2i) -> Result<(), MapError> {
		let box_center = b.center();
		while !self.root_info().bounds(self.log2_tile_w).contains_box(b) {
			let center = self.root_info().bounds(self.log2_tile_w).center();
			self.stretch(box_center - center)?;
		}
		Ok(())
	}

	/// Returns the leaf at `p` if present, or `Ok(None)` if `p` is in bounds
	/// but unwritten. Fails with [`MapError::BoundsViolation`] if `p` falls
	/// outside [`PersistentMap::get_bounds`] — reads never auto-stretch,
	/// only writes do. Populates the index lazily along the way; never
	/// allocates.
	pub fn read(&mut self, p: Vector2i) -> Result<Option<PlainTile>, MapError> {
		tracy::zone!("PersistentMap::read");
		if !self.get_bounds().contains_point(p) {
			return Err(MapError::BoundsViolation);
		}
		let root_info = self.root_info();
		match seek_slot(&mut self.file, &mut self.index_root, root_info, p, 0, self.log2_tile_w)? {
			Some((pos, info)) if info.depth == 0 => Ok(Some(self.read_leaf_at(pos)?)),
			_ => Ok(None),
		}
	}

	pub fn read_stream(&mut self) -> FileWalker<'_> { FileWalker::new(self, None) }

	pub fn read_limited<'a>(&'a mut self, limit: Box<dyn BoxIntersectable + 'a>) -> FileWalker<'a> { FileWalker::new(self, Some(limit)) }

	/// `fit(p)`, `alloc(root, p, 0)`, then overwrite or union the leaf bytes
	/// in place depending on `write_mode`. A freshly-appended leaf starts
	/// all-zero, so unioning into it is equivalent to a plain write.
	pub fn write(&mut self, p: Vector2i, tile: PlainTile) -> Result<(), MapError> {
		tracy::zone!("PersistentMap::write");
		self.fit_point(p)?;
		let (pos, _) = self.alloc_item_at_depth(p, 0)?;
		match self.write_mode {
			WriteMode::Overwrite => self.write_leaf_at(pos, &tile)?,
			WriteMode::Add => {
				let existing = self.read_leaf_at(pos)?;
				self.write_leaf_at(pos, &existing.union(&tile))?;
			}
		}
		Ok(())
	}

	/// `fit(stream.bounds())`; finds the tightest sub-item containing the
	/// stream's bounds, allocates it, then allocates and unions each
	/// incoming tile. A stream with zero-area bounds is a silent no-op.
	pub fn write_stream(&mut self, src: &mut impl TileIStream<PlainTile>) -> Result<(), MapError> {
		tracy::zone!("PersistentMap::write_stream");
		let bounds = src.get_bounds();
		if bounds.area() == 0 {
			return Ok(());
		}
		self.fit_box(bounds)?;
		let root_info = self.root_info();
		let virtual_dst = quadtree::fitted_info(root_info, bounds, self.log2_tile_w);
		self.alloc_item_at_depth(virtual_dst.origin, virtual_dst.depth)?;
		while let Some(next_tile) = src.next() {
			let origin = src.last_origin();
			let (pos, _) = self.alloc_item_at_depth(origin, 0)?;
			match self.write_mode {
				WriteMode::Overwrite => self.write_leaf_at(pos, next_tile)?,
				WriteMode::Add => {
					let existing = self.read_leaf_at(pos)?;
					self.write_leaf_at(pos, &existing.union(next_tile))?;
				}
			}
		}
		Ok(())
	}

	fn write_header(&mut self) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(0))?;
		self.file.write_all(&self.header.encode())
	}

	/// Rewrites the header if it's been marked dirty since the last flush.
	pub fn flush(&mut self) -> Result<(), MapError> {
		if self.header_dirty {
			self.write_header()?;
			self.header_dirty = false;
		}
		Ok(())
	}
}

impl Drop for PersistentMap {
	fn drop(&mut self) {
		if self.header_dirty {
			if let Err(e) = self.write_header() {
				log::error!("failed to flush occupancy map header on drop: {}", e);
			}
		}
	}
}

/// Depth-first walker over a [`PersistentMap`]'s file. Re-descends from the
/// root on every step rather than holding live references into the index,
/// so a lazy branch-read on miss can freely mutate the tree it's walking.
pub struct FileWalker<'a> {
	map: &'a mut PersistentMap,
	bounds: Box2i,
	limit: Option<Box<dyn BoxIntersectable + 'a>>,
	stack: Vec<(Info, u8, Vec<u8>)>,
	last_origin: Vector2i,
	last_tile: Option<PlainTile>,
}

impl<'a> FileWalker<'a> {
	fn new(map: &'a mut PersistentMap, limit: Option<Box<dyn BoxIntersectable + 'a>>) -> Self {
		let bounds = map.root_info().bounds(map.log2_tile_w);
		let mut w = FileWalker { map, bounds, limit, stack: Vec::new(), last_origin: Vector2i::ZERO, last_tile: None };
		w.reset();
		w
	}

	fn passes_limit(&self, b: Box2i) -> bool { self.limit.as_ref().map_or(true, |l| l.intersects(b)) }
}

impl<'a> TileIStream<PlainTile> for FileWalker<'a> {
	fn reset(&mut self) {
		self.stack.clear();
		let root_info = self.map.root_info();
		if !matches!(self.map.index_root, ChildSlot::Absent) {
			let b = root_info.bounds(self.map.log2_tile_w);
			if b.intersects(&self.bounds) && self.passes_limit(b) {
				self.stack.push((root_info, 0, Vec::new()));
			}
		}
	}

	fn next(&mut self) -> Option<&PlainTile> {
		tracy::zone!("FileWalker::next");
		loop {
			let (info, idx, path) = self.stack.last().cloned()?;
			if info.depth == 0 {
				self.stack.pop();
				self.last_origin = info.origin;
				let node = locate_mut(&mut self.map.index_root, &path);
				let pos = node.pos;
				let tile = match self.map.read_leaf_at(pos) {
					Ok(t) => t,
					Err(e) => {
						log::error!("file walker failed to read leaf at offset {}: {}", pos, e);
						return None;
					}
				};
				self.last_tile = Some(tile);
				return self.last_tile.as_ref();
			}
			if idx >= 4 {
				self.stack.pop();
				continue;
			}
			self.stack.last_mut().unwrap().1 += 1;
			let log2_tile_w = self.map.log2_tile_w;
			let child_depth = info.depth - 1;
			let hwidth = 1i64 << (child_depth + log2_tile_w);
			let child_origin = info.origin + next_branch_disp(idx as usize, hwidth);
			let child_info = Info::new(child_origin, child_depth);
			let child_bounds = child_info.bounds(log2_tile_w);
			if !child_bounds.intersects(&self.bounds) || !self.passes_limit(child_bounds) {
				continue;
			}
			let node = locate_mut(&mut self.map.index_root, &path);
			if let Err(e) = ensure_populated(&mut self.map.file, node) {
				log::error!("file walker failed to populate branch at offset {}: {}", node.pos, e);
				return None;
			}
			match &node.children[idx as usize] {
				ChildSlot::Absent => continue,
				ChildSlot::Unknown => unreachable!("ensure_populated leaves no children Unknown"),
				ChildSlot::Present(_) => {
					let mut child_path = path.clone();
					child_path.push(idx);
					self.stack.push((child_info, 0, child_path));
				}
			}
		}
	}

	fn last_origin(&self) -> Vector2i { self.last_origin }

	fn get_bounds(&self) -> Box2i { self.bounds }

	fn set_bounds(&mut self, new_bounds: Box2i) {
		let root_info = self.map.root_info();
		let aligned = align_out(new_bounds, root_info.origin, self.map.log2_tile_w);
		self.bounds = root_info.bounds(self.map.log2_tile_w).intersection(aligned);
		self.reset();
	}
}
