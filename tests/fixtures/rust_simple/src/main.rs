mod inventory;

use inventory::Inventory;

fn main() {
    let mut inv = Inventory::new();
    restock(&mut inv, 3);
    let total = inv.total();
    println!("{}", total);
}

fn restock(inv: &mut Inventory, n: u32) {
    for _ in 0..n {
        inv.add(1);
    }
}
