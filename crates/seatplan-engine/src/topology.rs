//! Logical seat grids and the adjacency relation between seats.
//!
//! A hall's seats are laid out row-major, `width` seats per row, so seat `n`
//! sits at row `(n - 1) / width`, column `(n - 1) % width`. Two seats are
//! adjacent when they share a row boundary (left/right in the same row) or a
//! column boundary (directly above/below). The last row may be partial; seats
//! past the capacity do not exist.

use std::{collections::BTreeMap, num::NonZeroU32, ops::RangeInclusive};

use seatplan_core::model::{Hall, HallId, SeatNumber};

use crate::{Error, Result};

/// How wide each hall's logical rows are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowWidth {
  /// The integer closest to √capacity, computed per hall.
  #[default]
  Auto,
  /// One width for every hall.
  Fixed(NonZeroU32),
}

impl RowWidth {
  /// `0` means [`RowWidth::Auto`].
  pub fn from_config(width: Option<u32>) -> Self {
    width.and_then(NonZeroU32::new).map_or(Self::Auto, Self::Fixed)
  }

  pub fn for_capacity(self, capacity: u32) -> u32 {
    match self {
      Self::Auto => (f64::from(capacity).sqrt().round() as u32).max(1),
      Self::Fixed(w) => w.get(),
    }
  }
}

/// The grid of a single hall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HallGrid {
  pub hall_id:  HallId,
  pub name:     String,
  pub capacity: u32,
  pub width:    u32,
}

impl HallGrid {
  pub fn new(hall: &Hall, width: RowWidth) -> Self {
    Self {
      hall_id:  hall.id,
      name:     hall.name.clone(),
      capacity: hall.capacity,
      width:    width.for_capacity(hall.capacity),
    }
  }

  pub fn contains(&self, seat: SeatNumber) -> bool { (1..=self.capacity).contains(&seat) }

  fn check(&self, seat: SeatNumber) -> Result<()> {
    if self.contains(seat) {
      Ok(())
    } else {
      Err(Error::InvalidSeat { hall_id: self.hall_id, seat, capacity: self.capacity })
    }
  }

  /// Zero-based `(row, column)` of `seat`.
  pub fn position(&self, seat: SeatNumber) -> Result<(u32, u32)> {
    self.check(seat)?;
    let offset = seat - 1;
    Ok((offset / self.width, offset % self.width))
  }

  /// Seats sharing an edge with `seat`, in ascending seat order.
  pub fn adjacent(&self, seat: SeatNumber) -> Result<Vec<SeatNumber>> {
    let (_, col) = self.position(seat)?;
    let mut out = Vec::with_capacity(4);

    if seat > self.width {
      out.push(seat - self.width);
    }
    if col > 0 {
      out.push(seat - 1);
    }
    if col + 1 < self.width && seat < self.capacity {
      out.push(seat + 1);
    }
    if let Some(below) = seat.checked_add(self.width)
      && below <= self.capacity
    {
      out.push(below);
    }
    Ok(out)
  }

  pub fn seats(&self) -> RangeInclusive<SeatNumber> { 1..=self.capacity }
}

/// Grids for every hall of a run, visited in ascending hall id.
#[derive(Debug, Clone, Default)]
pub struct SeatingTopology {
  grids: BTreeMap<HallId, HallGrid>,
}

impl SeatingTopology {
  pub fn new<'a>(halls: impl IntoIterator<Item = &'a Hall>, width: RowWidth) -> Self {
    let grids = halls
      .into_iter()
      .map(|h| (h.id, HallGrid::new(h, width)))
      .collect();
    Self { grids }
  }

  pub fn grid(&self, hall_id: HallId) -> Result<&HallGrid> {
    self.grids.get(&hall_id).ok_or(Error::UnknownHall(hall_id))
  }

  /// Seats adjacent to `seat_number` in hall `hall_id`.
  pub fn adjacent_seats(
    &self,
    hall_id: HallId,
    seat_number: SeatNumber,
  ) -> Result<Vec<SeatNumber>> {
    self.grid(hall_id)?.adjacent(seat_number)
  }

  pub fn position(&self, hall_id: HallId, seat_number: SeatNumber) -> Result<(u32, u32)> {
    self.grid(hall_id)?.position(seat_number)
  }

  /// Halls in ascending id order.
  pub fn halls(&self) -> impl Iterator<Item = &HallGrid> { self.grids.values() }

  pub fn is_empty(&self) -> bool { self.grids.is_empty() }

  pub fn total_capacity(&self) -> u64 {
    self.grids.values().map(|g| u64::from(g.capacity)).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hall(id: HallId, capacity: u32) -> Hall {
    Hall { id, name: format!("Hall {id}"), capacity }
  }

  fn fixed(w: u32) -> RowWidth { RowWidth::Fixed(NonZeroU32::new(w).unwrap()) }

  #[test]
  fn auto_width_rounds_square_root() {
    assert_eq!(RowWidth::Auto.for_capacity(1), 1);
    assert_eq!(RowWidth::Auto.for_capacity(2), 1);
    assert_eq!(RowWidth::Auto.for_capacity(4), 2);
    assert_eq!(RowWidth::Auto.for_capacity(7), 3);
    assert_eq!(RowWidth::Auto.for_capacity(30), 5);
    assert_eq!(fixed(6).for_capacity(30), 6);
  }

  #[test]
  fn from_config_treats_zero_as_auto() {
    assert_eq!(RowWidth::from_config(None), RowWidth::Auto);
    assert_eq!(RowWidth::from_config(Some(0)), RowWidth::Auto);
    assert_eq!(RowWidth::from_config(Some(3)), fixed(3));
  }

  #[test]
  fn two_by_two_grid_adjacency() {
    let topo = SeatingTopology::new(&[hall(1, 4)], fixed(2));
    assert_eq!(topo.adjacent_seats(1, 1).unwrap(), [2, 3]);
    assert_eq!(topo.adjacent_seats(1, 2).unwrap(), [1, 4]);
    assert_eq!(topo.adjacent_seats(1, 3).unwrap(), [1, 4]);
    assert_eq!(topo.adjacent_seats(1, 4).unwrap(), [2, 3]);
  }

  #[test]
  fn row_ends_do_not_wrap() {
    // 3 wide: seat 3 ends row 0, seat 4 starts row 1.
    let topo = SeatingTopology::new(&[hall(1, 9)], fixed(3));
    assert_eq!(topo.adjacent_seats(1, 3).unwrap(), [2, 6]);
    assert_eq!(topo.adjacent_seats(1, 4).unwrap(), [1, 5, 7]);
    assert_eq!(topo.adjacent_seats(1, 5).unwrap(), [2, 4, 6, 8]);
    assert_eq!(topo.position(1, 6).unwrap(), (1, 2));
  }

  #[test]
  fn partial_last_row_has_no_phantom_neighbours() {
    let topo = SeatingTopology::new(&[hall(1, 5)], fixed(3));
    assert_eq!(topo.adjacent_seats(1, 2).unwrap(), [1, 3, 5]);
    assert_eq!(topo.adjacent_seats(1, 3).unwrap(), [2]);
    assert_eq!(topo.adjacent_seats(1, 5).unwrap(), [2, 4]);
  }

  #[test]
  fn single_column_is_a_vertical_chain() {
    let topo = SeatingTopology::new(&[hall(1, 2)], RowWidth::Auto);
    assert_eq!(topo.adjacent_seats(1, 1).unwrap(), [2]);
    assert_eq!(topo.adjacent_seats(1, 2).unwrap(), [1]);
  }

  #[test]
  fn adjacency_is_symmetric() {
    let topo = SeatingTopology::new(&[hall(1, 23)], RowWidth::Auto);
    let grid = topo.grid(1).unwrap();
    for seat in grid.seats() {
      for n in grid.adjacent(seat).unwrap() {
        assert!(grid.adjacent(n).unwrap().contains(&seat), "{seat} <-> {n}");
      }
    }
  }

  #[test]
  fn unknown_hall_and_seat_are_errors() {
    let topo = SeatingTopology::new(&[hall(1, 4), hall(2, 6)], RowWidth::Auto);
    assert!(matches!(topo.adjacent_seats(9, 1), Err(Error::UnknownHall(9))));
    assert!(matches!(topo.adjacent_seats(1, 0), Err(Error::InvalidSeat { .. })));
    assert!(matches!(topo.adjacent_seats(1, 5), Err(Error::InvalidSeat { .. })));
    assert_eq!(topo.total_capacity(), 10);
    let ids: Vec<HallId> = topo.halls().map(|g| g.hall_id).collect();
    assert_eq!(ids, [1, 2]);
  }
}
