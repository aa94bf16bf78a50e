use std::fs::File;
use std::io::Write;

use screenstate_config::{ProbeCsvRow, load_probe_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("probes.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_rows_in_order() {
    let (_dir, path) = write_csv(
        "state,id,x,y,r,g,b,tolerance\n\
         loaded,banner,171,947,255,255,248,10\n\
         city_view, flag ,50,100,200,40,40,25\n",
    );
    let rows = load_probe_csv(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[1],
        ProbeCsvRow {
            state: "city_view".into(),
            id: "flag".into(),
            x: 50,
            y: 100,
            r: 200,
            g: 40,
            b: 40,
            tolerance: 25,
        }
    );
}

#[rstest]
fn rejects_wrong_headers() {
    let (_dir, path) = write_csv("state,id,x,y,red,green,blue,tol\nloaded,a,1,1,1,1,1,1\n");
    let err = load_probe_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("must have headers"));
}

#[rstest]
fn rejects_header_only_file() {
    let (_dir, path) = write_csv("state,id,x,y,r,g,b,tolerance\n");
    let err = load_probe_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("no rows"));
}

#[rstest]
#[case::color_overflow("loaded,a,1,1,256,0,0,5\n")]
#[case::negative_coord("loaded,a,-1,1,0,0,0,5\n")]
fn rejects_out_of_range_values(#[case] row: &str) {
    let (_dir, path) = write_csv(&format!("state,id,x,y,r,g,b,tolerance\n{row}"));
    let err = load_probe_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("invalid CSV row 2"));
}
