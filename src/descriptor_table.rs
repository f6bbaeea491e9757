use crate::{BUFFER_ALIGNMENT, MAX_BUFFER_SIZE};

/// Which side may currently touch a descriptor and the buffer it points to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Owner {
    Cpu,
    Dma,
}

/// A hardware descriptor that can be chained into a [`DescriptorTable`].
pub trait DescriptorEntry: Copy {
    /// An all-zero descriptor, used to build tables in const context.
    const EMPTY: Self;

    /// Owner of the descriptor right after the ring is (re)initialized.
    const INITIAL_OWNER: Owner;

    /// Point the descriptor at its buffer and at the next descriptor in the chain,
    /// and hand it to [`Self::INITIAL_OWNER`].
    fn initialize(
        &mut self,
        buffer: *const u8,
        buffer_size: usize,
        next: *const Self,
        end_of_ring: bool,
    );

    fn owner(&self) -> Owner;
    fn set_owner(&mut self, owner: Owner);
}

/// Index of the descriptor following `index` in a ring of `count` entries.
pub const fn next_index(index: usize, count: usize) -> usize {
    (index + 1) % count
}

/// Whether a single descriptor can own a buffer of `size` bytes.
pub(crate) const fn valid_buffer_size(size: usize) -> bool {
    size > 0 && size <= MAX_BUFFER_SIZE && size % BUFFER_ALIGNMENT == 0
}

#[repr(C, align(4))]
#[derive(Clone, Copy)]
struct Buffer<const SIZE: usize>([u8; SIZE]);

/// A closed ring of `COUNT` descriptors, each bound to its own `BUFFER_SIZE`
/// byte buffer.
///
/// Descriptors are addressed by index; the hardware's next-descriptor pointers are
/// written once by [`initialize`](Self::initialize) and never followed by
/// software. The table must stay at the same address for as long as the DMA
/// engine is running.
#[repr(C)]
pub struct DescriptorTable<D, const COUNT: usize, const BUFFER_SIZE: usize> {
    descriptors: [D; COUNT],
    buffers: [Buffer<BUFFER_SIZE>; COUNT],

    cursor: usize, // Index of next entry to produce/consume
}

impl<D: DescriptorEntry, const COUNT: usize, const BUFFER_SIZE: usize>
    DescriptorTable<D, COUNT, BUFFER_SIZE>
{
    const VALID: () = {
        assert!(COUNT > 0, "a descriptor ring needs at least one entry");
        assert!(
            valid_buffer_size(BUFFER_SIZE),
            "buffer size must be a non-zero multiple of 4 that fits the descriptor size field"
        );
    };

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        DescriptorTable {
            descriptors: [D::EMPTY; COUNT],
            buffers: [Buffer([0; BUFFER_SIZE]); COUNT],
            cursor: 0,
        }
    }

    /// Wire every descriptor to its buffer, close the chain and hand each entry
    /// to its initial owner. Any in-flight state is discarded.
    pub(crate) fn initialize(&mut self) {
        let base: *const D = self.descriptors.as_ptr();
        for (i, descriptor) in self.descriptors.iter_mut().enumerate() {
            let buffer_address = self.buffers[i].0.as_ptr();
            let next = base.wrapping_add(next_index(i, COUNT));
            descriptor.initialize(buffer_address, BUFFER_SIZE, next, i == COUNT - 1);
        }

        self.cursor = 0;
    }

    /// Address programmed into the DMA descriptor list register.
    pub fn base_address(&self) -> u32 {
        self.descriptors.as_ptr() as usize as u32
    }

    pub const fn len(&self) -> usize {
        COUNT
    }

    pub const fn is_empty(&self) -> bool {
        COUNT == 0
    }

    pub const fn buffer_size(&self) -> usize {
        BUFFER_SIZE
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn advance(&mut self) {
        self.cursor = next_index(self.cursor, COUNT);
    }

    pub(crate) fn advance_by(&mut self, count: usize) {
        self.cursor = (self.cursor + count) % COUNT;
    }

    /// Index `offset` entries after the cursor.
    pub(crate) fn index_from_cursor(&self, offset: usize) -> usize {
        (self.cursor + offset) % COUNT
    }

    pub fn owner(&self, index: usize) -> Owner {
        self.descriptors[index].owner()
    }

    pub fn descriptor(&self, index: usize) -> &D {
        &self.descriptors[index]
    }

    pub(crate) fn descriptor_mut(&mut self, index: usize) -> &mut D {
        &mut self.descriptors[index]
    }

    pub(crate) fn buffer(&self, index: usize) -> &[u8] {
        &self.buffers[index].0
    }

    pub(crate) fn descriptor_pair_mut(&mut self, index: usize) -> (&mut D, &mut [u8]) {
        (&mut self.descriptors[index], &mut self.buffers[index].0)
    }
}

impl<D: DescriptorEntry, const COUNT: usize, const BUFFER_SIZE: usize> Default
    for DescriptorTable<D, COUNT, BUFFER_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}
